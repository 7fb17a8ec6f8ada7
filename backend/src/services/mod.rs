//! Ledger services for the Broiler Cycle Ledger
//!
//! `cycle_log`, `feed` and `stock` expose functions that run on a caller's
//! transaction; the `*Service` types own a pool and open the transactions.

pub mod cycle;
pub mod cycle_log;
pub mod farmer;
pub mod feed;
pub mod notification;
pub mod sale;
pub mod stock;

pub use cycle::CycleService;
pub use farmer::FarmerService;
pub use feed::FeedService;
pub use notification::NotificationService;
pub use sale::SaleService;
