//! # Structured Logging
//!
//! Tracing setup for the publication pipeline. Filtering follows
//! `RUST_LOG` (default `info`); output format is selected with
//! `CROSSPOST_LOG_FORMAT=json|pretty`, JSON being the shape log
//! aggregators ingest.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber once.
///
/// Safe to call from every entry point; later calls are no-ops, and an
/// already-installed subscriber (e.g. from a test harness) is left in
/// place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        let result = if use_json_format() {
            registry
                .with(fmt::layer().json().with_target(true))
                .try_init()
        } else {
            registry.with(fmt::layer().with_target(true)).try_init()
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }
    });
}

fn use_json_format() -> bool {
    matches!(
        std::env::var("CROSSPOST_LOG_FORMAT").as_deref(),
        Ok("json")
    )
}
