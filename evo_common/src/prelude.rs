//! Prelude module for common re-exports.
//!
//! ```rust
//! use evo_common::prelude::*;
//! ```

pub use crate::config::{AdminDefaults, ConfigError, ConfigLoader, LogLevel, resolve_cfg_value};
pub use crate::init_tracing;
