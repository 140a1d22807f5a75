//! Tracing Setup
//!
//! Console tracing for the generator binary. Diagnostics go to standard
//! error so generated declaration text on standard output stays clean.
//!
//! # Configuration
//!
//! - `RUST_LOG`: tracing filter directives (default: `info`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use rxgrpc::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// # Panics
///
/// Panics if tracing subscriber initialization fails.
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
