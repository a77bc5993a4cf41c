pub mod api;

pub mod auth;

pub mod cache;

pub mod config;

pub mod db;

pub mod error;

pub mod matching;

pub mod migrate;

pub mod services;

/// Crate version, recorded in the migration ledger at apply time.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");
