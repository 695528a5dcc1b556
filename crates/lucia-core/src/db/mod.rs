pub mod adapter;
pub mod models;

pub use adapter::{Adapter, AdapterResult};
pub use models::{Key, Session, SessionAndUser, User, UserAttributes};
