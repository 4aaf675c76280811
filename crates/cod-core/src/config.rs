//! Configuration constants and tuning parameters for the pi engine.
//!
//! This module centralizes the series constants and all thresholds to
//! facilitate tuning and keep the engine and the assembler consistent.
//!
//! # Threshold Justifications
//!
//! The crossover values are derived from benchmarks on a multi-core desktop
//! and mark the points where the cost profile of the computation changes.

/// Fixed constants of the Chudnovsky series.
///
/// These are part of the series definition and are not tunable.
pub mod chudnovsky {
    /// `640320³ / 24`, the per-term denominator factor of `Q(a, a+1)`.
    pub const Q_FACTOR: u64 = 10_939_058_860_032_000;

    /// Linear coefficient of the term numerator `545140134·a + 13591409`.
    pub const LINEAR_A: u64 = 545_140_134;

    /// Constant coefficient of the term numerator.
    pub const LINEAR_B: u64 = 13_591_409;

    /// `640320^{3/2} / 12 / sqrt(10005)`, the numerator multiplier of the final formula.
    pub const NUMERATOR: u32 = 426_880;

    /// Radicand of the final square root.
    pub const SQRT_RADICAND: u32 = 10_005;

    /// Decimal digits contributed by one series term (rounded down, ~14.1816).
    pub const DIGITS_PER_TERM: u64 = 14;

    /// Guard digits added to every request before deriving terms and precision.
    pub const GUARD_DIGITS: u64 = 4;

    /// Working bits per decimal digit, expressed as a ratio (3.33 = 333 / 100).
    ///
    /// Slightly above $\log_2 10 \approx 3.3219$ so the fixed-point result
    /// carries more bits than the digits it has to render.
    pub const BITS_PER_DIGIT_NUM: u64 = 333;
    pub const BITS_PER_DIGIT_DEN: u64 = 100;
}

/// Evaluation thresholds for the binary-splitting engine.
pub mod thresholds {
    /// Lower bound for the calibrated parallel term threshold.
    ///
    /// Below this range size the rayon task overhead dominates the tiny
    /// multiplications at the leaves of the recursion.
    pub const MIN_PARALLEL_TERMS: u64 = 64;

    /// Upper bound for the calibrated parallel term threshold.
    pub const MAX_PARALLEL_TERMS: u64 = 2_048;

    /// Range size (in terms) below which `Adaptive` evaluation stays sequential.
    ///
    /// 1,500 terms is roughly 21,000 digits. Smaller requests finish in a few
    /// milliseconds, so spawning tasks would only add latency.
    pub const ADAPTIVE_PARALLEL_TERMS: u64 = 1_500;

    /// Bit-length threshold for using FFT vs standard multiplication.
    ///
    /// When both operands of a combine product exceed this bit length,
    /// FFT-based multiplication is used instead of the library multiplication.
    ///
    /// Set conservatively to ensure FFT overhead is amortized.
    pub const FFT_BIT_THRESHOLD: usize = 200_000;
}

/// Memory and safety limits.
pub mod limits {
    /// Largest digit count accepted by the assembler.
    ///
    /// Keeps the power of ten inside the `u32` exponent of `PiOps::power`.
    pub const MAX_DIGITS: u64 = 1_000_000_000;

    /// Maximum memory allocation (in bytes) before rejecting a request.
    ///
    /// Default: 8 GB. Prevents out-of-memory aborts on extreme inputs.
    pub const SAFE_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;
}

/// FFT-specific tuning parameters.
pub mod fft {
    /// Widest limb, in bits, used to spread operands into FFT samples.
    ///
    /// # Precision Constraint
    ///
    /// Must satisfy: $2 \times \text{width} + \log_2(\text{fft\_size}) < 53$
    ///
    /// With 13-bit limbs the constraint holds up to an FFT size of $2^{26}$.
    /// Larger transforms narrow the limbs, see [`layout`].
    pub const BASE_BITS_DEFAULT: usize = 13;

    /// Narrowest limb tried before giving up on FFT multiplication.
    pub const MIN_BASE_BITS: usize = 10;

    /// Mantissa bits of an `f64`, the bound of every exact convolution sample.
    pub const MANTISSA_BITS: usize = 53;

    /// Number of root-level products evaluated at the same time by the
    /// parallel combine step.
    pub const CONCURRENT_PRODUCTS: u64 = 4;

    /// Picks the limb width and transform size for a product of operands of
    /// `a_bits` and `b_bits` bits.
    ///
    /// Tries the widest limb first and narrows it until the precision
    /// constraint holds. Returns `None` when no width down to
    /// [`MIN_BASE_BITS`] fits.
    pub fn layout(a_bits: u64, b_bits: u64) -> Option<(usize, usize)> {
        (MIN_BASE_BITS..=BASE_BITS_DEFAULT).rev().find_map(|width| {
            let w = width as u64;
            let limbs = a_bits.div_ceil(w).checked_add(b_bits.div_ceil(w))?;
            let size = usize::try_from(limbs).ok()?.checked_next_power_of_two()?;
            (2 * width + (size.trailing_zeros() as usize) < MANTISSA_BITS).then_some((width, size))
        })
    }

    /// Bytes allocated by one FFT product of operands of `a_bits` and `b_bits`
    /// bits: two complex signals plus the rounded coefficients.
    pub fn scratch_bytes(a_bits: u64, b_bits: u64) -> u64 {
        match layout(a_bits, b_bits) {
            Some((width, size)) => {
                let limbs = a_bits.div_ceil(width as u64) + b_bits.div_ceil(width as u64);
                (size as u64).saturating_mul(2 * 16).saturating_add(limbs * 8)
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_bounds_are_ordered() {
        assert!(
            thresholds::MIN_PARALLEL_TERMS < thresholds::MAX_PARALLEL_TERMS,
            "MIN_PARALLEL_TERMS must be less than MAX_PARALLEL_TERMS"
        );
    }

    #[test]
    fn q_factor_is_640320_cubed_over_24() {
        let c: u128 = 640_320;
        assert_eq!(c * c * c / 24, chudnovsky::Q_FACTOR as u128);
    }

    #[test]
    fn bits_per_digit_exceeds_log2_10() {
        let ratio = chudnovsky::BITS_PER_DIGIT_NUM as f64 / chudnovsky::BITS_PER_DIGIT_DEN as f64;
        assert!(ratio > std::f64::consts::LOG2_10);
    }

    #[test]
    fn fft_layout_respects_mantissa() {
        for log2 in [10u32, 20, 26, 27, 28, 30, 31, 33, 36] {
            let bits = 1u64 << log2;
            if let Some((width, size)) = fft::layout(bits, bits) {
                assert!(
                    2 * width + (size.trailing_zeros() as usize) < fft::MANTISSA_BITS,
                    "width {} with size {} loses precision",
                    width,
                    size
                );
                assert!((size as u64) * width as u64 >= 2 * bits);
            }
        }
    }

    #[test]
    fn fft_layout_narrows_limbs_for_large_products() {
        assert_eq!(fft::layout(1_000_000, 1_000_000).map(|l| l.0), Some(13));
        // 2^31 samples at 12 bits would need 55 bits of mantissa
        let (width, size) = fft::layout(5_000_000_000, 5_000_000_000).unwrap();
        assert!(width < 12);
        assert!(2 * width + (size.trailing_zeros() as usize) < 53);
        assert_eq!(fft::layout(u64::MAX, u64::MAX), None);
    }

    #[test]
    fn fft_scratch_counts_both_signals() {
        // 2 * 2^17 limbs of 13 bits fit a 2^18 transform
        let bits = 13 * (1u64 << 17);
        let limbs = 2 * (1u64 << 17);
        assert_eq!(fft::scratch_bytes(bits, bits), (1u64 << 18) * 32 + limbs * 8);
        assert_eq!(fft::scratch_bytes(u64::MAX, u64::MAX), 0);
    }

    #[test]
    fn limits_are_reasonable() {
        assert!(limits::MAX_DIGITS <= u32::MAX as u64);
        assert!(limits::SAFE_MEMORY_BYTES >= 1024 * 1024 * 1024);
    }
}
