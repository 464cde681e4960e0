//! dbcalc - sizing calculator for MySQL clusters run by an operator.
//!
//! Given a resource envelope, a workload profile and a connection count the
//! calculator derives a full parameter set for the engine, proxy and monitor
//! and judges whether the envelope can carry the load.

pub mod autosize;
pub mod calculator;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod configurator;
pub mod dimensions;
pub mod error;
pub mod render;
pub mod replication;
pub mod resolver;
pub mod server;
pub mod tiers;
pub mod types;
pub mod version_filter;
