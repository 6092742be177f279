//! Credit card statement tracking: billing-cycle math, SQLite storage,
//! and the CLI/HTTP front ends built on top of them.

pub mod api;
pub mod config;
pub mod dates;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod validation;

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT_TRACING: Once = Once::new();

/// Installs the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing(filter: &str) {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    });
}
