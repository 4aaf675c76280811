//! # COD Core
//!
//! Arbitrary-precision computation of pi by the Chudnovsky series.
//!
//! The series is evaluated by binary splitting: a term index range `[a, b)` is
//! reduced to an integer triple `(P, Q, R)`, halves are combined recursively,
//! and one final square root and division turn the root triple into digits.
//!
//! ## Strategies
//!
//! - **Sequential**: depth-first recursion on the calling thread.
//! - **Parallel**: the two halves of every large split run on the rayon pool.
//! - **Adaptive** (default): parallel only for large term ranges.
//!
//! Products of huge operands go through FFT multiplication (default `ibig`
//! backend) or GMP (`gmp` feature).
//!
//! ## Usage
//!
//! ```rust
//! use cod_core::compute_pi;
//!
//! let pi = compute_pi(30).unwrap();
//! assert_eq!(pi, "3.141592653589793238462643383279");
//! ```
//!
//! ### Strategy, cancellation and progress
//!
//! ```rust
//! use cod_core::{compute_pi_with, CancelToken, Evaluation, PiOptions};
//!
//! let options = PiOptions {
//!     evaluation: Evaluation::Parallel,
//!     cancel: Some(CancelToken::new()),
//!     progress: Some(Box::new(|p: f64| eprintln!("{:.0}%", p * 100.0))),
//! };
//! let result = compute_pi_with(1_000, &options).unwrap();
//! assert_eq!(result.pi.len(), 1_002);
//! ```

pub mod algo;
pub mod assembler;
pub mod config;
pub mod output;
pub mod types;

// Re-export types
pub use types::{CancelToken, Evaluation, PiError, PiInt, PiOps, Triple};

// Re-export the assembler API
pub use assembler::{
    compute_pi, compute_pi_timed, compute_pi_with, estimate_memory_bytes, precision_bits,
    term_count, validate_digits, PiComputation, PiOptions,
};

pub use output::{
    last_chars, pi_file_name, write_pi_file, DigitChunks, PI_FILE_HEADER, RESULT_PREFIX,
};

// Re-export helper for initializing system
pub use algo::parallel::get_parallel_threshold;

use std::time::Duration;

#[cfg(not(feature = "gmp"))]
use rayon::prelude::*;

/// Pre-warms the system by calibrating thresholds and initializing thread-local resources.
///
/// This function is designed to prevent first-call latency spikes in production environments,
/// such as API servers or CLI tools. It performs the following actions:
/// 1.  **Calibration**: Runs a micro-benchmark to determine the term count above which splits run in parallel (`algo::parallel::get_parallel_threshold`).
/// 2.  **Thread Pool Initialization**: Wakes up the Rayon thread pool.
/// 3.  **FFT Planner Initialization**: Initializes thread-local FFT planners on all worker threads (default backend only).
///
/// # Usage
///
/// Call this function once at the start of your application (e.g., in `main`).
///
/// ```rust
/// fn main() {
///     cod_core::prewarm_system();
///     // ... application logic ...
/// }
/// ```
pub fn prewarm_system() {
    // 1. Force calibration
    algo::parallel::get_parallel_threshold();

    // 2. Pre-warm Rayon thread pool and FFT planners
    #[cfg(not(feature = "gmp"))]
    {
        let _ = rayon::join(
            || {
                algo::fft::prewarm_fft_planner();
            },
            || {
                let threads = rayon::current_num_threads();
                if threads > 1 {
                    (0..threads).into_par_iter().for_each(|_| {
                        algo::fft::prewarm_fft_planner();
                    });
                }
            },
        );
    }
    #[cfg(feature = "gmp")]
    rayon::broadcast(|_| ());
}

/// Runs every evaluation strategy concurrently for `digits` and returns their results.
///
/// This function is primarily used for benchmarking and for verifying that all
/// strategies agree. Input validation happens once, before any work starts.
///
/// # Returns
///
/// A vector of `(strategy, duration, result)`, in the order
/// Sequential, Parallel, Adaptive.
///
/// # Errors
/// The first error reported by any strategy.
///
/// # Example
///
/// ```rust
/// use cod_core::run_all_strategies;
///
/// let results = run_all_strategies(200).unwrap();
/// for (strategy, duration, pi) in &results {
///     println!("{}: {:?}, {} chars", strategy, duration, pi.len());
/// }
/// assert!(results.windows(2).all(|w| w[0].2 == w[1].2));
/// ```
pub fn run_all_strategies(digits: i64) -> Result<Vec<(Evaluation, Duration, String)>, PiError> {
    validate_digits(digits)?;

    let run = |evaluation: Evaluation| {
        compute_pi_with(digits, &PiOptions::with_evaluation(evaluation))
            .map(|c| (evaluation, c.elapsed, c.pi))
    };

    let (sequential, (parallel, adaptive)) = rayon::join(
        || run(Evaluation::Sequential),
        || {
            rayon::join(
                || run(Evaluation::Parallel),
                || run(Evaluation::Adaptive),
            )
        },
    );

    Ok(vec![sequential?, parallel?, adaptive?])
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Tests for prewarm_system
    // ========================================================================

    #[test]
    fn prewarm_system_no_panic() {
        // Should complete without panicking
        prewarm_system();
    }

    #[test]
    fn prewarm_system_idempotent() {
        prewarm_system();
        prewarm_system();
        prewarm_system();
    }

    // ========================================================================
    // Tests for run_all_strategies
    // ========================================================================

    #[test]
    fn run_all_strategies_returns_three_results() {
        let results = run_all_strategies(10).unwrap();
        assert_eq!(results.len(), 3, "Should return 3 strategy results");
        let strategies: Vec<Evaluation> = results.iter().map(|(s, _, _)| *s).collect();
        assert_eq!(
            strategies,
            vec![Evaluation::Sequential, Evaluation::Parallel, Evaluation::Adaptive]
        );
    }

    #[test]
    fn run_all_strategies_consistent_results() {
        let results = run_all_strategies(500).unwrap();

        let first_result = &results[0].2;
        for (strategy, _, result) in &results {
            assert_eq!(
                result, first_result,
                "Strategy {} produced different result",
                strategy
            );
        }
    }

    #[test]
    fn run_all_strategies_known_value() {
        for (strategy, _, result) in run_all_strategies(10).unwrap() {
            assert_eq!(result, "3.1415926535", "Strategy {} produced wrong value", strategy);
        }
    }

    #[test]
    fn run_all_strategies_rejects_invalid_digits() {
        assert_eq!(
            run_all_strategies(0),
            Err(PiError::InvalidDigitCount { digits: 0 })
        );
    }

    #[test]
    fn compute_pi_idempotent() {
        assert_eq!(compute_pi(257).unwrap(), compute_pi(257).unwrap());
    }

    #[test]
    fn compute_pi_prefix_consistency() {
        let short = compute_pi(5).unwrap();
        let long = compute_pi(50).unwrap();
        assert!(long.starts_with(&short));
    }
}
