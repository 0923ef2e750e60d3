//! Decision support for retail site selection: TOPSIS ranking over candidate sites with
//! versioned, atomically committed result batches.

pub mod config;
pub mod error;
pub mod ranking;
pub mod sites;
pub mod telemetry;
