//! Binary-splitting engine for the Chudnovsky series.
//!
//! This module groups the evaluation strategies for the `(P, Q, R)` recursion
//! provided by `cod-core`. Every strategy computes the same triple; they differ
//! in scheduling and in how the largest products are multiplied.
//!
//! # Strategies
//!
//! - **Sequential (`split`)**: depth-first recursion on one thread.
//! - **Parallel (`parallel`)**: both halves of every large split run concurrently.
//! - **FFT multiplication (`fft`)**: used inside either strategy for huge operands.
//! - **Adaptive**: a selector that chooses by range size.

use crate::config::thresholds;
use crate::{Evaluation, PiError, Triple};

#[cfg(not(feature = "gmp"))]
pub mod fft;
pub mod parallel;
pub mod progress;
pub mod split;

pub use parallel::binary_split_parallel;
pub use progress::{ProgressReporter, ProgressTracker};
pub use split::{base_triple, binary_split, combine, SplitHooks};

/// Evaluates the triple of `[a, b)` with the requested strategy.
///
/// # Threshold Justifications
///
/// - **$b - a \le 1,500$ terms**: **Sequential** under `Adaptive`.
///   For small ranges, the overhead of Rayon's task management outweighs the
///   benefit of multiplying tiny operands concurrently.
///
/// - **$b - a > 1,500$ terms**: **Parallel** under `Adaptive`.
///   The two halves of each split are independent, and the cost of the combine
///   products grows with the range size, so fanning out pays for itself.
///
/// # Errors
/// * `PiError::InvalidRange` if `a >= b`.
/// * `PiError::Cancelled` if a cancel token in `hooks` is triggered.
///
/// # Example
/// ```
/// use cod_core::algo::{evaluate_range, binary_split, SplitHooks};
/// use cod_core::Evaluation;
///
/// let t = evaluate_range(1, 100, Evaluation::Adaptive, SplitHooks::default()).unwrap();
/// assert_eq!(t, binary_split(1, 100).unwrap());
/// ```
pub fn evaluate_range(
    a: u64,
    b: u64,
    evaluation: Evaluation,
    hooks: SplitHooks<'_>,
) -> Result<Triple, PiError> {
    let parallel = match evaluation {
        Evaluation::Sequential => false,
        Evaluation::Parallel => true,
        Evaluation::Adaptive => b.saturating_sub(a) > thresholds::ADAPTIVE_PARALLEL_TERMS,
    };

    if parallel {
        parallel::split_parallel(a, b, parallel::get_parallel_threshold(), hooks)
    } else {
        split::split_sequential(a, b, hooks)
    }
}
