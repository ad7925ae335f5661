//! fleetscore-core: scoring and attribution core of the fleet dashboard.
//!
//! One deterministic pass over an in-memory snapshot produces per-driver
//! flags and drop risk, per-dispatcher retention, tenure and compliance,
//! and team KPIs for a payroll window.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod event;
pub mod flags;
pub mod kpi;
pub mod records;
pub mod retention;
pub mod risk;
pub mod snapshot;
pub mod stats;
pub mod tenure;
pub mod threshold;
pub mod types;
