pub mod auth;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use auth::{hash_token, issue_token, AuthSession};
pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use repositories::{Repositories, RepositoryError};
