//! Loading and validation of proxwarn TOML configuration files.

pub mod error;
pub mod file;

pub use error::{ConfigError, Result};
pub use file::{LoadedConfig, load_config, parse_config};
