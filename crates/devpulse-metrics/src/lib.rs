//! Metric derivation for the devpulse engine.
//!
//! Each module computes one group of metrics (pull-request flow, security
//! posture, repository health, collaboration, sprint delivery) as a pure
//! function over a [`RecordBatch`]. The [`MetricsCalculator`] picks the
//! groups an entity kind produces and assembles them into a dated
//! [`MetricsSnapshot`], substituting group defaults when a single group
//! fails so one bad record list never voids the whole snapshot.
//!
//! [`RecordBatch`]: devpulse_common::types::RecordBatch
//! [`MetricsSnapshot`]: devpulse_common::types::MetricsSnapshot

pub mod calculator;
pub mod collaboration;
pub mod health;
pub mod pulls;
pub mod security;
pub mod sprint;

#[cfg(test)]
mod tests;

pub use calculator::MetricsCalculator;
