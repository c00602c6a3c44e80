//! Analysis stages.
//!
//! `behavior` and `cohort` produce player stats, `net_result` attributes
//! money against a focal player, `filter` and `timeline` build the camp
//! time series, and `aggregator` drives all of them over a batch.

pub mod aggregator;
pub mod behavior;
pub mod cohort;
pub mod filter;
pub mod net_result;
pub mod timeline;

pub use aggregator::{analyze, build_timeline, Analysis, BatchOptions};
pub use timeline::TimeUnit;
