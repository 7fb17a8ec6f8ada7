//! Shared types and rules for the Broiler Cycle Ledger
//!
//! This crate contains the domain models, the ledger rules and the metrics
//! calculator shared between the backend, the browser bindings (via WASM),
//! and other components of the system.

pub mod feed;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod types;
pub mod validation;

pub use feed::*;
pub use ledger::*;
pub use metrics::*;
pub use models::*;
pub use types::*;
pub use validation::*;
