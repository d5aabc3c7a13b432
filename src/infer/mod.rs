//! Approximate inference over a ground MRF.
//!
//! - [`mcsat`]: MC-SAT marginal estimation (slice sampling over satisfying
//!   assignments with SampleSAT as the inner sampler)
//! - [`maxwalksat`]: MaxWalkSAT search for a most probable state
//!
//! Both work on a [`state::SearchState`] built from the MRF and write their
//! results back into it once every chain has finished.

pub mod maxwalksat;
pub mod mcsat;
mod state;

use crate::error::InferError;
use crate::mrf::Cost;

pub use maxwalksat::{MaxWalkSat, MaxWalkSatConfig};
pub use mcsat::{McSat, McSatConfig};

/// Counters reported by an inference run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceStats {
    /// Samples collected over all chains.
    pub samples: u64,
    /// Chains (or MaxWalkSAT tries) that ran.
    pub chains: usize,
    /// Total variable flips.
    pub flips: u64,
    /// Rounds whose local search ran out of flips before satisfying the
    /// active constraints. Their samples are still recorded.
    pub non_converged: u64,
    /// Rounds whose unit propagation hit a conflict.
    pub propagation_conflicts: u64,
    /// Cost of the best state seen.
    pub best_cost: Cost,
    /// Whether the run stopped on the cancellation flag.
    pub cancelled: bool,
}

/// Run `f` on a dedicated pool of `threads` workers, or on the global pool.
fn install<T: Send>(threads: Option<usize>, f: impl FnOnce() -> T + Send) -> Result<T, InferError> {
    match threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map(|pool| pool.install(f))
            .map_err(|e| InferError::ThreadPool {
                message: e.to_string(),
            }),
        None => Ok(f()),
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), InferError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InferError::InvalidParameter {
            name,
            value: value.to_string(),
            expected: "a probability in [0, 1]",
        })
    }
}

fn check_positive(name: &'static str, value: usize) -> Result<(), InferError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(InferError::InvalidParameter {
            name,
            value: value.to_string(),
            expected: "an integer >= 1",
        })
    }
}
