//! Logging and tracing configuration for the VHD reader
//!
//! The library only emits `tracing` events; a subscriber is installed by the
//! binary (or by an embedding application).
//!
//! - `debug` - open/parse decisions (footer location, layout, window size)
//! - `trace` - every sparse read and BAT window reload
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug vhd-reader disk.vhd
//! RUST_LOG=vhd_reader_lib::vhd=trace vhd-reader disk.vhd
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging/tracing system
///
/// Call this once at application startup (in main.rs)
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default: info in release, debug in debug builds
        if cfg!(debug_assertions) {
            EnvFilter::new("vhd_reader=debug,vhd_reader_lib=debug")
        } else {
            EnvFilter::new("vhd_reader=info,vhd_reader_lib=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact(),
    );

    // Ignore the error if a subscriber is already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, every read traced)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
