//! Top-level facade crate for the Marathon exporter.
//!
//! Re-exports the translation core and the server library so users can depend on a single crate.

pub mod core {
    pub use marathon_exporter_core::*;
}

pub mod server {
    pub use marathon_exporter_server::*;
}
