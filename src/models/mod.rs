pub mod user;

pub use user::{LinkedProvider, Provider, ProviderLink, Role, User, UserProfile};
