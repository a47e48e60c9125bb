pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod outbox;
pub mod provisioner;
pub mod routes;
pub mod schema;
pub mod state;
pub mod status;
pub mod store;
pub mod tokens;
pub mod validation;

pub use lifecycle::{LifecycleCoordinator, LifecycleError};
