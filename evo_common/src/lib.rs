//! EVO Common Library
//!
//! Shared logging and configuration-resolution primitives used by the
//! `shmem_admin` core and its CLI.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading, env/flag resolution, log levels
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! evo = { package = "evo_common", path = "../evo_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use evo::config::{LogLevel, resolve_cfg_value};
//! ```

pub mod config;
pub mod prelude;

/// Initialize tracing for structured, RT-safe logging.
///
/// Mirrors the subscriber setup used across the EVO workspace: no target
/// module path (too noisy), thread ids on, source line numbers on.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
