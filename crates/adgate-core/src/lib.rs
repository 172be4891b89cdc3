//! Adgate Core Library
//!
//! Core types, configuration, and the error taxonomy shared by the directory
//! client, the local identity store, and the authentication orchestrator.

pub mod config;
pub mod error;
pub mod types;

pub use config::AdgateConfig;
pub use error::{Error, Result};

/// Adgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server-side page size used for paged directory searches
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Connect timeout applied to endpoints that do not set their own (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// OID of the simple paged results control
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";
