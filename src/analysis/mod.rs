//! Statistics over the store's collections.

pub mod aggregator;

pub use aggregator::*;
