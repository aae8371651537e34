//! # Telemetry
//!
//! Tracing subscriber setup for binaries and services embedding the engine.
//!
//! Every crate logs through `tracing` macros with structured fields; nothing
//! is printed until a subscriber is installed here (or by the host).

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,tally=debug,sqlx=warn";

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - ERROR: storage failures and timeouts while writing a sale
/// - WARN: sale number collisions, ledger drift, rollbacks that failed
/// - INFO: committed sales and stock movements
/// - DEBUG: stage transitions, SQL-level operations
///
/// Set `RUST_LOG` to override, e.g. `RUST_LOG=tally_engine=trace`.
///
/// Calling it again, or after the host installed its own subscriber, leaves
/// the existing subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
