//! HTTP handlers for the Broiler Cycle Ledger API

mod cycle;
mod farmer;
mod health;
mod sale;

pub use cycle::*;
pub use farmer::*;
pub use health::*;
pub use sale::*;
