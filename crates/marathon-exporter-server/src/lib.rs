//! Marathon exporter server library entry.
//!
//! Wires config, the HTTP fetcher, per-source scrape coordinators and the
//! axum router into a runnable exporter. Consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod cli;
pub mod config;
pub mod exporter;
pub mod fetch;
pub mod ops;
pub mod router;
pub mod scrape;
pub mod startup;
