//! Core types and traits for the Snicket URL shortener.
//!
//! This crate provides the storage contract and shared types used by
//! the storage backends, the code generator and the service layer.

pub mod clock;
pub mod error;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoreError;
pub use store::{DomainStat, Record, Store};
