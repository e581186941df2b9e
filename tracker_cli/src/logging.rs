//! Centralized tracing initialization for the `multitrack` binary.

use tracing::subscriber::DefaultGuard;

/// Initializes tracing with a thread-local subscriber, respecting
/// `RUST_LOG` (defaults to `info`), without target/file/line noise.
pub fn init_tracing() -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}
