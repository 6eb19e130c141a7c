pub mod config;
pub mod error;
pub mod types;

pub use config::{protocol, routing, ConfigError, RelayConfig, RelayRole};
pub use error::{RelayNetError, Result};
pub use types::{Endpoint, Timestamp};
