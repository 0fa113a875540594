//! Refresh orchestration for the devpulse metrics pipeline.
//!
//! Wires the ingestion adapter, metrics calculator, compliance reporting,
//! and snapshot store into scheduled and on-demand refresh cycles.

pub mod benchmark_seed;
pub mod config;
pub mod refresh;
pub mod scheduler;
