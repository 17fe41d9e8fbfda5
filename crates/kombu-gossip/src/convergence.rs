//! Convergence predicate and measurement outcome.

use kombu_clock::ClockSnapshot;
use std::collections::BTreeSet;
use std::time::Duration;

/// Check whether a set of clock snapshots has converged.
///
/// Converged means: for every node-id key present in any snapshot, every
/// pairwise difference between counters (missing entries count as 0) is
/// within `tolerance`. Fewer than two snapshots never count as converged —
/// a lone node has nobody to agree with.
pub fn converged(snapshots: &[ClockSnapshot], tolerance: u64) -> bool {
    if snapshots.len() < 2 {
        return false;
    }

    let keys: BTreeSet<&String> = snapshots.iter().flat_map(|s| s.keys()).collect();

    for key in keys {
        for i in 0..snapshots.len() {
            for j in (i + 1)..snapshots.len() {
                let a = snapshots[i].get(key).copied().unwrap_or(0);
                let b = snapshots[j].get(key).copied().unwrap_or(0);
                if a.abs_diff(b) > tolerance {
                    return false;
                }
            }
        }
    }
    true
}

/// Result of a convergence measurement.
///
/// A timeout is a bounded duration, not an error — callers distinguish the
/// two variants rather than matching on elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// Convergence observed after the contained elapsed time.
    Converged(Duration),

    /// The measurement gave up after the contained limit.
    TimedOut(Duration),
}

impl ConvergenceOutcome {
    /// Whether convergence was observed.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceOutcome::Converged(_))
    }

    /// Elapsed time in either case.
    pub fn elapsed(&self) -> Duration {
        match self {
            ConvergenceOutcome::Converged(d) | ConvergenceOutcome::TimedOut(d) => *d,
        }
    }
}
