use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Result, TrackerError};

pub const DB_ENV: &str = "CC_TRACKER_DB";
pub const ADDR_ENV: &str = "CC_TRACKER_ADDR";
pub const LOG_ENV: &str = "RUST_LOG";

const DEFAULT_DB_FILE: &str = "cc_tracker.db";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_LOG_FILTER: &str = "cc_statement_tracker=info";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Raw listen address; only the HTTP backend parses it.
    pub bind_addr: String,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(DB_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
        let bind_addr = lookup(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let log_filter = lookup(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            db_path,
            bind_addr,
            log_filter,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr.parse().map_err(|_| {
            TrackerError::InvalidInput(format!(
                "{} is not a socket address: {}",
                ADDR_ENV, self.bind_addr
            ))
        })
    }
}
