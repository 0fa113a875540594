use devpulse_common::types::{Benchmark, BenchmarkOp, ComplianceStatus, MetricValue};

/// Outcome of evaluating one metric against one benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub status: ComplianceStatus,
    pub score: u8,
}

impl Verdict {
    fn of(status: ComplianceStatus) -> Self {
        Verdict {
            status,
            score: status.score(),
        }
    }
}

/// Evaluate one observed value against its benchmark.
///
/// Missing data never passes: an absent value or an absent benchmark both
/// yield FAIL with score 0. Boolean values are coerced to 100.0 / 0.0
/// before comparison, so `eq` with `pass_threshold = 100` expresses
/// "the flag must be set".
pub fn evaluate(value: Option<MetricValue>, benchmark: Option<&Benchmark>) -> Verdict {
    let (Some(value), Some(benchmark)) = (value, benchmark) else {
        return Verdict::of(ComplianceStatus::Fail);
    };

    let v = value.as_f64();
    let status = match benchmark.operator {
        BenchmarkOp::Gte => check_gte(v, benchmark),
        BenchmarkOp::Lte => check_lte(v, benchmark),
        BenchmarkOp::Eq => check_eq(v, benchmark),
        BenchmarkOp::Range => check_range(v, benchmark),
    };
    Verdict::of(status)
}

/// Higher is better. A `None` threshold disables its tier and falls through.
fn check_gte(v: f64, b: &Benchmark) -> ComplianceStatus {
    if b.pass_threshold.is_some_and(|p| v >= p) {
        return ComplianceStatus::Pass;
    }
    if b.warn_threshold.is_some_and(|w| v >= w) {
        return ComplianceStatus::Warn;
    }
    ComplianceStatus::Fail
}

/// Lower is better. Mirror of [`check_gte`].
fn check_lte(v: f64, b: &Benchmark) -> ComplianceStatus {
    if b.pass_threshold.is_some_and(|p| v <= p) {
        return ComplianceStatus::Pass;
    }
    if b.warn_threshold.is_some_and(|w| v <= w) {
        return ComplianceStatus::Warn;
    }
    ComplianceStatus::Fail
}

/// Exact match against `pass_threshold`; no warn tier.
fn check_eq(v: f64, b: &Benchmark) -> ComplianceStatus {
    if b.pass_threshold.is_some_and(|p| v == p) {
        ComplianceStatus::Pass
    } else {
        ComplianceStatus::Fail
    }
}

/// Band check. `fail_threshold` is the hard upper bound shared by the pass
/// and warn bands; `pass_threshold` / `warn_threshold` are the lower bounds
/// of their tiers. A `None` lower bound disables its tier, a `None` upper
/// bound leaves the band unbounded above.
fn check_range(v: f64, b: &Benchmark) -> ComplianceStatus {
    let within_upper = b.fail_threshold.map_or(true, |f| v <= f);
    if within_upper && b.pass_threshold.is_some_and(|p| v >= p) {
        return ComplianceStatus::Pass;
    }
    if within_upper && b.warn_threshold.is_some_and(|w| v >= w) {
        return ComplianceStatus::Warn;
    }
    ComplianceStatus::Fail
}
