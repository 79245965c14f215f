//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the AccountStore port
//! - An HTTP messaging API client and an SMTP relay client for the Notifier port
//! - An in-process recording notifier for demo mode and tests

pub mod demo;
pub mod duckdb;
pub mod http_notifier;
pub mod smtp_notifier;
