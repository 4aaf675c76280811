//! Precision assembler: from a digit count to the decimal string of pi.
//!
//! The series triple for `[1, N)` is turned into pi with
//!
//! $$\pi \approx \frac{\sqrt{10005} \cdot Q \cdot 426880}{Q \cdot 13591409 + R}$$
//!
//! evaluated in binary fixed point. The working precision is a plain number of
//! fractional bits passed down the call chain, so concurrent computations never
//! share any precision state.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::algo::{self, ProgressReporter, ProgressTracker, SplitHooks};
use crate::config::{chudnovsky, fft, limits};
use crate::{CancelToken, Evaluation, PiError, PiInt, PiOps, Triple};

/// Options for [`compute_pi_with`].
#[derive(Default)]
pub struct PiOptions {
    /// How the recursion is scheduled.
    pub evaluation: Evaluation,
    /// Checked at every split boundary.
    pub cancel: Option<CancelToken>,
    /// Receives the completed fraction of the series evaluation.
    pub progress: Option<ProgressReporter>,
}

impl PiOptions {
    pub fn with_evaluation(evaluation: Evaluation) -> Self {
        Self {
            evaluation,
            ..Self::default()
        }
    }
}

/// A finished computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiComputation {
    /// Fractional digits requested.
    pub digits: u64,
    /// `"3."` followed by `digits` fractional digits.
    pub pi: String,
    /// Wall-clock time from series evaluation to rendering.
    pub elapsed: Duration,
    /// Series terms summed (`N`).
    pub terms: u64,
    /// Fixed-point fractional bits used by the final step.
    pub precision_bits: u64,
}

/// Number of series terms `N` for `digits` fractional digits.
///
/// $N = \lfloor (digits + 4) / 14 \rfloor + 1$, raised to at least 2 so that the
/// range `[1, N)` is never empty. For `digits + 4 < 14` this yields the single
/// term range `[1, 2)`, whose triple is the hardcoded
/// `Q = 10939058860032000, R = -2793657715`.
///
/// # Example
/// ```
/// use cod_core::term_count;
///
/// assert_eq!(term_count(1), 2);
/// assert_eq!(term_count(10), 2);
/// assert_eq!(term_count(100), 8);
/// ```
#[inline]
pub fn term_count(digits: u64) -> u64 {
    ((digits + chudnovsky::GUARD_DIGITS) / chudnovsky::DIGITS_PER_TERM + 1).max(2)
}

/// Fixed-point precision in bits: $\lfloor (digits + 4) \cdot 3.33 \rfloor + 1$.
///
/// Computed in integers so that no float rounding can shift the floor.
#[inline]
pub fn precision_bits(digits: u64) -> u64 {
    (digits + chudnovsky::GUARD_DIGITS) * chudnovsky::BITS_PER_DIGIT_NUM
        / chudnovsky::BITS_PER_DIGIT_DEN
        + 1
}

/// Bits of the root `Q` and `R`: about $N (\log_2 Q_{factor} + 3 \log_2 N)$.
fn root_bits(digits: u64) -> u64 {
    let terms = term_count(digits) as u128;
    let log_terms = (128 - terms.leading_zeros()) as u128;
    u64::try_from(terms * (54 + 3 * log_terms)).unwrap_or(u64::MAX)
}

/// Estimates the peak memory usage (in bytes) of a computation of `digits` digits.
///
/// Two parts dominate:
/// - the root triple, with room for `P`, the two operands and the product
///   of the final combine step;
/// - the FFT buffers of the root combine, whose four products run at the
///   same time and each multiply two halves of the root width.
///
/// The estimation adds a 10% safety margin for object overhead.
pub fn estimate_memory_bytes(digits: u64) -> u64 {
    let bits = root_bits(digits);
    let values = bits as u128 * 6 / 8;
    let half = bits / 2;
    let scratch = fft::CONCURRENT_PRODUCTS as u128 * fft::scratch_bytes(half, bits - half) as u128;
    ((values + scratch) * 11 / 10).min(u64::MAX as u128) as u64
}

/// Validates a requested digit count against input rules and resource limits.
///
/// # Errors
/// * `PiError::InvalidDigitCount` if `digits < 1`.
/// * `PiError::ResourceExhausted` if `digits` exceeds `limits::MAX_DIGITS` or the
///   estimated memory exceeds `limits::SAFE_MEMORY_BYTES`.
pub fn validate_digits(digits: i64) -> Result<u64, PiError> {
    if digits < 1 {
        return Err(PiError::InvalidDigitCount { digits });
    }
    let digits = digits as u64;

    let required_bytes = estimate_memory_bytes(digits);
    if digits > limits::MAX_DIGITS || required_bytes > limits::SAFE_MEMORY_BYTES {
        return Err(PiError::ResourceExhausted {
            required_bytes,
            limit_bytes: limits::SAFE_MEMORY_BYTES,
        });
    }
    Ok(digits)
}

/// Turns `Q` and `R` of the range `[1, N)` into `"3."` plus `digits` digits.
///
/// # Steps
///
/// 1. $S = \lfloor \sqrt{10005 \cdot 4^{prec}} \rfloor = \lfloor \sqrt{10005} \cdot 2^{prec} \rfloor$
/// 2. $\Pi = \lfloor S \cdot Q \cdot 426880 / (Q \cdot 13591409 + R) \rfloor \approx \pi \cdot 2^{prec}$
/// 3. $D = \lfloor \Pi \cdot 10^{digits} / 2^{prec} \rfloor \approx \lfloor \pi \cdot 10^{digits} \rfloor$
///
/// The result is truncated, never rounded up.
///
/// # Errors
/// * `PiError::ComputationError` if the denominator is not positive or the
///   rendered integer does not have the shape of pi.
pub fn assemble(q: &PiInt, r: &PiInt, digits: u64, precision_bits: u64) -> Result<String, PiError> {
    let prec = precision_bits as usize;

    let denominator = q.product(&PiInt::from(chudnovsky::LINEAR_B)) + r.clone();
    if denominator <= PiInt::from(0u32) {
        return Err(PiError::ComputationError(format!(
            "series denominator is not positive ({} bits)",
            denominator.magnitude_bits()
        )));
    }

    let sqrt_fixed = PiInt::from(chudnovsky::SQRT_RADICAND)
        .shl_bits(2 * prec)
        .isqrt();
    let numerator = sqrt_fixed
        .product(q)
        .product(&PiInt::from(chudnovsky::NUMERATOR));
    let pi_fixed = numerator.quotient(&denominator);

    let ten_pow = PiInt::from(10u32).power(digits as u32);
    let scaled = pi_fixed.product(&ten_pow).shr_bits(prec);

    render(&scaled, digits)
}

/// Renders $\lfloor \pi \cdot 10^{digits} \rfloor$ as `"3.xxxx"`.
fn render(scaled: &PiInt, digits: u64) -> Result<String, PiError> {
    let raw = scaled.to_string();
    if raw.len() as u64 != digits + 1 || !raw.starts_with('3') {
        let preview: String = raw.chars().take(12).collect();
        return Err(PiError::ComputationError(format!(
            "unexpected result shape: {} digits starting with {}",
            raw.len(),
            preview
        )));
    }

    let mut out = String::with_capacity(raw.len() + 1);
    out.push_str(&raw[..1]);
    out.push('.');
    out.push_str(&raw[1..]);
    Ok(out)
}

/// Computes the series triple for `digits` digits with the given options.
pub fn series_triple(digits: u64, options: &PiOptions) -> Result<Triple, PiError> {
    let terms = term_count(digits);
    let tracker = options
        .progress
        .as_ref()
        .map(|reporter| ProgressTracker::new(terms - 1, reporter));
    if let Some(tracker) = &tracker {
        tracker.start();
    }

    let hooks = SplitHooks {
        cancel: options.cancel.as_ref(),
        progress: tracker.as_ref(),
    };
    algo::evaluate_range(1, terms, options.evaluation, hooks)
}

/// Computes pi to `digits` fractional digits.
///
/// # Errors
/// * `PiError::InvalidDigitCount` if `digits < 1`.
/// * `PiError::ResourceExhausted` if the request exceeds the safe limits.
/// * `PiError::ComputationError` if an arithmetic sanity check fails.
///
/// # Example
/// ```
/// use cod_core::compute_pi;
///
/// assert_eq!(compute_pi(10).unwrap(), "3.1415926535");
/// assert!(compute_pi(0).is_err());
/// ```
pub fn compute_pi(digits: i64) -> Result<String, PiError> {
    compute_pi_timed(digits).map(|c| c.pi)
}

/// Computes pi and reports the elapsed wall-clock time.
pub fn compute_pi_timed(digits: i64) -> Result<PiComputation, PiError> {
    compute_pi_with(digits, &PiOptions::default())
}

/// Computes pi with an explicit strategy, cancellation and progress reporting.
///
/// # Errors
/// All errors of [`compute_pi`], plus `PiError::Cancelled` if the cancel token
/// is triggered before the series evaluation finishes.
pub fn compute_pi_with(digits: i64, options: &PiOptions) -> Result<PiComputation, PiError> {
    let digits = validate_digits(digits)?;
    let terms = term_count(digits);
    let precision_bits = precision_bits(digits);

    let start = Instant::now();
    debug!(digits, terms, precision_bits, evaluation = %options.evaluation, "evaluating series");

    let Triple { q, r, .. } = series_triple(digits, options)?;
    debug!(
        q_bits = q.magnitude_bits(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "series evaluated"
    );

    let pi = assemble(&q, &r, digits, precision_bits)?;
    let elapsed = start.elapsed();
    debug!(elapsed_ms = elapsed.as_millis() as u64, "pi assembled");

    Ok(PiComputation {
        digits,
        pi,
        elapsed,
        terms,
        precision_bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PI_100: &str = "3.1415926535897932384626433832795028841971693993751058209749445923078164062862089986280348253421170679";

    #[test]
    fn term_count_matches_formula() {
        assert_eq!(term_count(9), 2); // 13 / 14 + 1 = 1 -> raised to 2
        assert_eq!(term_count(10), 2); // 14 / 14 + 1
        assert_eq!(term_count(23), 2);
        assert_eq!(term_count(24), 3);
        assert_eq!(term_count(1_000), 72);
    }

    #[test]
    fn precision_bits_matches_formula() {
        assert_eq!(precision_bits(1), 17); // floor(16.65) + 1
        assert_eq!(precision_bits(10), 47); // floor(46.62) + 1
        assert_eq!(precision_bits(96), 334); // floor(333.0) + 1
    }

    #[test]
    fn assemble_with_hardcoded_base_triple() {
        let q = PiInt::from(10_939_058_860_032_000u64);
        let r = PiInt::from(-2_793_657_715i128);
        assert_eq!(assemble(&q, &r, 5, precision_bits(5)).unwrap(), "3.14159");
    }

    #[test]
    fn assemble_rejects_non_positive_denominator() {
        let q = PiInt::from(1u32);
        let r = PiInt::from(-13_591_409i128);
        assert!(matches!(
            assemble(&q, &r, 5, precision_bits(5)),
            Err(PiError::ComputationError(_))
        ));
    }

    #[test]
    fn compute_pi_first_hundred_digits() {
        assert_eq!(compute_pi(100).unwrap(), PI_100);
    }

    #[test]
    fn compute_pi_small_counts() {
        for d in 1..=15 {
            assert_eq!(compute_pi(d).unwrap(), &PI_100[..d as usize + 2], "digits={}", d);
        }
    }

    #[test]
    fn validate_digits_rejects_bad_input() {
        assert_eq!(validate_digits(0), Err(PiError::InvalidDigitCount { digits: 0 }));
        assert_eq!(validate_digits(-5), Err(PiError::InvalidDigitCount { digits: -5 }));
        assert!(matches!(
            validate_digits(limits::MAX_DIGITS as i64 + 1),
            Err(PiError::ResourceExhausted { .. })
        ));
        assert_eq!(validate_digits(42), Ok(42));
    }

    #[test]
    fn estimate_memory_grows_with_digits() {
        assert!(estimate_memory_bytes(10) < estimate_memory_bytes(1_000));
        assert!(estimate_memory_bytes(1_000) < estimate_memory_bytes(1_000_000));
    }

    #[test]
    fn estimate_memory_counts_fft_buffers() {
        // One root product at 1e8 digits spreads into two 2^27-sample signals
        let one_product = 2 * (1u64 << 27) * 16;
        assert!(estimate_memory_bytes(100_000_000) > 4 * one_product);
        assert!(matches!(
            validate_digits(100_000_000),
            Err(PiError::ResourceExhausted { .. })
        ));
        assert!(matches!(
            validate_digits(limits::MAX_DIGITS as i64),
            Err(PiError::ResourceExhausted { .. })
        ));
        assert!(validate_digits(10_000_000).is_ok());
    }

    #[test]
    fn accepted_counts_keep_root_products_exact() {
        let mut digits = 1_000u64;
        while digits <= limits::MAX_DIGITS {
            if validate_digits(digits as i64).is_ok() {
                let bits = root_bits(digits);
                let (width, size) = fft::layout(bits / 2, bits - bits / 2)
                    .unwrap_or_else(|| panic!("no exact layout at {} digits", digits));
                assert!(
                    2 * width + (size.trailing_zeros() as usize) < fft::MANTISSA_BITS,
                    "digits={}",
                    digits
                );
            }
            digits = digits * 3 / 2;
        }
    }

    #[test]
    fn compute_pi_with_reports_metadata() {
        let c = compute_pi_with(30, &PiOptions::with_evaluation(Evaluation::Sequential)).unwrap();
        assert_eq!(c.digits, 30);
        assert_eq!(c.terms, term_count(30));
        assert_eq!(c.precision_bits, precision_bits(30));
        assert_eq!(c.pi, &PI_100[..32]);
    }

    #[test]
    fn compute_pi_with_cancelled_token() {
        let token = CancelToken::new();
        token.cancel();
        let options = PiOptions {
            cancel: Some(token),
            ..PiOptions::default()
        };
        assert_eq!(compute_pi_with(500, &options), Err(PiError::Cancelled));
    }

    #[test]
    fn compute_pi_with_progress_reaches_completion() {
        use std::sync::{Arc, Mutex};

        let reports = Arc::new(Mutex::new(Vec::<f64>::new()));
        let sink = reports.clone();
        let options = PiOptions {
            progress: Some(Box::new(move |p: f64| sink.lock().unwrap().push(p))),
            ..PiOptions::default()
        };
        compute_pi_with(2_000, &options).unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.first(), Some(&0.0));
        assert_eq!(reports.last(), Some(&1.0));
    }
}
