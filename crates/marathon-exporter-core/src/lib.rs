//! Marathon exporter core: name normalization, per-scrape series registries,
//! and translation of the Marathon metrics document into typed series.
//!
//! This crate carries no transport or runtime dependencies. The server crate
//! owns fetching, scheduling, and HTTP exposure; everything here is pure data
//! handling so it can be tested without a network.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed source documents must surface as `ExporterError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod apps;
pub mod error;
pub mod exposition;
pub mod naming;
pub mod registry;
pub mod translate;

/// Shared result type.
pub use error::{ExporterError, Result};
pub use exposition::Exposition;
pub use registry::{Generation, Series, SeriesKind, SeriesRegistry};
