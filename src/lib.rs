//! Rxflow — prescription fulfillment & queue estimation engine.
//!
//! Routes a scanned prescription through fulfillment: extracts prescribed
//! items from raw document text, matches them against the live catalog,
//! reserves stock atomically, queues the order for packing with a
//! cumulative wait estimate, and gates physical handoff behind a one-time
//! code. Document OCR, authentication and transport live outside this
//! crate; see [`extract::DocumentTextSource`] and
//! [`authorization::Caller`] for the seams they plug into.

pub mod alerts;
pub mod authorization;
pub mod config;
pub mod db;
pub mod extract;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod orders;
pub mod queue;
pub mod service;

pub use service::{FulfillmentError, FulfillmentService};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for embedding applications.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
