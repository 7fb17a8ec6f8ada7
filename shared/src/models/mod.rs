//! Domain models for the Broiler Cycle Ledger

mod cycle;
mod farmer;
mod log;
mod sale;

pub use cycle::*;
pub use farmer::*;
pub use log::*;
pub use sale::*;
