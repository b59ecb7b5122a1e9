//! Domain layer: configuration, route policy, errors.

pub mod config;
pub mod error;
pub mod headers;
pub mod routes;

pub use config::{ConfigError, EncryptionConfig, GatewayConfig, ServerConfig};
pub use error::{GatewayError, Rejection};
pub use routes::{FailureMode, RoutePattern, RoutePolicy};
