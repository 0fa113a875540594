//! Benchmark evaluation and compliance report building.
//!
//! The evaluator is a pure function from (observed value, benchmark) to a
//! tri-state verdict; the report builder folds the verdicts of one metrics
//! snapshot into an aggregate [`ComplianceReport`] with an overall score,
//! a worst-of overall status and heuristic recommendations.
//!
//! [`ComplianceReport`]: devpulse_common::types::ComplianceReport

pub mod evaluator;
pub mod report;


pub use evaluator::{evaluate, Verdict};
pub use report::build_report;
