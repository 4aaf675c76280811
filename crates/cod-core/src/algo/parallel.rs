use crate::config::thresholds;
use crate::{PiError, PiOps, Triple};

use std::sync::OnceLock;
use std::time::Instant;

use super::split::{check_range, split_unchecked, SplitHooks};

/// Global threshold (in terms) for switching to parallel execution.
///
/// This value is lazily initialized by `calibrate_parallel_threshold`.
static PARALLEL_THRESHOLD: OnceLock<u64> = OnceLock::new();

/// Calibrates the parallel threshold based on system performance.
///
/// Runs a micro-benchmark to estimate single-core performance and combines it with
/// the number of available cores to determine an optimal range size.
/// Below this threshold, sequential execution is preferred to avoid task overhead.
///
/// # Returns
/// * `u64` - The threshold in series terms.
pub fn calibrate_parallel_threshold() -> u64 {
    // Micro-benchmark: split 512 terms (~7,000 digits) sequentially.
    // Large enough to measure but small enough to be fast (~1ms on modern CPUs)
    let start = Instant::now();
    let _ = super::split::binary_split(1, 513);
    let micros = start.elapsed().as_micros();

    let cores = rayon::current_num_threads();

    // Base threshold based on core count
    let base_threshold: u64 = if cores >= 8 {
        256
    } else if cores >= 4 {
        512
    } else {
        1_024
    };

    // If single thread is super fast, stay serial longer (overhead is expensive relative to compute).
    // If it is slow, fan out earlier.
    let threshold = if micros < 500 {
        base_threshold * 2
    } else if micros > 5_000 {
        base_threshold / 2
    } else {
        base_threshold
    };

    let threshold = threshold.clamp(thresholds::MIN_PARALLEL_TERMS, thresholds::MAX_PARALLEL_TERMS);
    tracing::trace!(micros, cores, threshold, "calibrated parallel threshold");
    threshold
}

/// Adaptive parallelism threshold - lazily calibrated on first use.
///
/// # Returns
/// * `u64` - The parallel threshold in terms.
pub fn get_parallel_threshold() -> u64 {
    *PARALLEL_THRESHOLD.get_or_init(calibrate_parallel_threshold)
}

/// Computes the triple of `[a, b)` by parallel binary splitting.
///
/// The two halves of every split larger than the calibrated threshold are
/// evaluated concurrently with `rayon::join`; they only meet again at the
/// combine step. Smaller ranges fall back to the sequential recursion.
///
/// Produces exactly the same triple as [`super::split::binary_split`].
///
/// # Errors
/// * `PiError::InvalidRange` if `a >= b`.
///
/// # Example
/// ```
/// use cod_core::algo::{binary_split, binary_split_parallel};
///
/// assert_eq!(binary_split_parallel(1, 200).unwrap(), binary_split(1, 200).unwrap());
/// ```
pub fn binary_split_parallel(a: u64, b: u64) -> Result<Triple, PiError> {
    split_parallel(a, b, get_parallel_threshold(), SplitHooks::default())
}

/// Parallel recursion with an explicit threshold and hooks.
pub fn split_parallel(
    a: u64,
    b: u64,
    threshold: u64,
    hooks: SplitHooks<'_>,
) -> Result<Triple, PiError> {
    check_range(a, b)?;
    split_parallel_unchecked(a, b, threshold.max(2), hooks)
}

fn split_parallel_unchecked(
    a: u64,
    b: u64,
    threshold: u64,
    hooks: SplitHooks<'_>,
) -> Result<Triple, PiError> {
    if b - a <= threshold {
        return split_unchecked(a, b, hooks);
    }
    hooks.checkpoint()?;

    let m = a + (b - a) / 2;
    let (left, right) = rayon::join(
        || split_parallel_unchecked(a, m, threshold, hooks),
        || split_parallel_unchecked(m, b, threshold, hooks),
    );
    let (left, right) = (left?, right?);

    // The three products of the combine step are independent.
    //   Task 1: P = Pam * Pmb
    //   Task 2: Q = Qam * Qmb
    //   Task 3: R = Qmb * Ram + Pam * Rmb
    let ((p, q), r) = rayon::join(
        || {
            rayon::join(
                || left.p.product(&right.p),
                || left.q.product(&right.q),
            )
        },
        || {
            let (qr, pr) = rayon::join(
                || right.q.product(&left.r),
                || left.p.product(&right.r),
            );
            qr + pr
        },
    );
    hooks.node_done(b - a);
    Ok(Triple { p, q, r })
}
