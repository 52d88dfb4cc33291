//! Configuration loading for the DMRlink client:
//! - Session configuration structures
//! - TOML configuration file parsing with unknown-field rejection

pub mod session_config;
pub mod toml_config;

pub use session_config::*;
pub use toml_config::*;
