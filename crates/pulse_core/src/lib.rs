pub mod analysis;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod ledger;
pub mod schema;
pub mod scoring;
pub mod similar;
pub mod triage;

pub use error::{PulseError, Result};
