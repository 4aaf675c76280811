//! FFT multiplication for the largest products of the recursion.
//!
//! Operands are cut into limbs of a few bits, each limb becomes one real
//! sample, and the product is the rounded cyclic convolution of the two
//! signals. Limb width is chosen per product so that every convolution
//! coefficient stays exact in an `f64` mantissa: $2w + \log_2(\text{size}) < 53$.

use crate::config::{fft as fft_config, thresholds};
use crate::PiInt;

use ibig::ops::UnsignedAbs;
use ibig::UBig;
use rayon::prelude::*;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Initializes the planner of the current thread.
///
/// Called by `prewarm_system` on every rayon worker, so the first large
/// product does not pay for lazy initialization.
pub fn prewarm_fft_planner() {
    PLANNER.with(|p| drop(p.borrow_mut()));
}

/// Fetches forward and inverse plans of `size`.
///
/// The planner borrow ends before any transform runs: a rayon worker waiting
/// inside `join` may pick up another multiplication on this same thread.
fn plans(size: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
    PLANNER.with(|planner| {
        let mut planner = planner.borrow_mut();
        (planner.plan_fft_forward(size), planner.plan_fft_inverse(size))
    })
}

/// Multiplies two signed big integers, routing large operands through FFT.
///
/// Below `thresholds::FFT_BIT_THRESHOLD` (on either operand) the library's
/// Karatsuba/Toom-Cook multiplication is faster and is used directly.
#[inline]
pub fn multiply(a: &PiInt, b: &PiInt) -> PiInt {
    let a_mag = a.unsigned_abs();
    let b_mag = b.unsigned_abs();
    if a_mag.bit_len() <= thresholds::FFT_BIT_THRESHOLD
        || b_mag.bit_len() <= thresholds::FFT_BIT_THRESHOLD
    {
        return a * b;
    }

    let zero = PiInt::from(0u32);
    let negative = (*a < zero) != (*b < zero);
    let magnitude = PiInt::from(fft_multiply(&a_mag, &b_mag));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Multiplies two unsigned big integers by FFT convolution.
///
/// # When to use
///
/// Operands of hundreds of thousands of bits and more, where the
/// $O(n \log n)$ convolution beats the $O(n^{1.585})$ Karatsuba multiplication.
///
/// # Algorithm
///
/// 1.  Pick the widest limb that keeps the transform exact, then spread both
///     operands into real signals of `width`-bit limbs.
/// 2.  Transform both signals (concurrently).
/// 3.  Multiply point-wise.
/// 4.  Transform back and round each coefficient to an integer.
/// 5.  Resolve carries and pack the limbs into the result.
pub fn fft_multiply(a: &UBig, b: &UBig) -> UBig {
    if a.bit_len() == 0 || b.bit_len() == 0 {
        return UBig::from(0u32);
    }

    let Some((width, size)) = fft_config::layout(a.bit_len() as u64, b.bit_len() as u64) else {
        // No limb width keeps the convolution exact at this size.
        return a * b;
    };
    let a_limbs = a.bit_len().div_ceil(width);
    let b_limbs = b.bit_len().div_ceil(width);
    let (forward, inverse) = plans(size);

    let (mut fa, mut fb) = rayon::join(
        || spread(a, width, size),
        || spread(b, width, size),
    );
    // Plans are shareable and the buffers are distinct.
    rayon::join(|| forward.process(&mut fa), || forward.process(&mut fb));

    fa.par_iter_mut().zip(fb.par_iter()).for_each(|(x, &y)| *x *= y);
    inverse.process(&mut fa);

    let norm = 1.0 / size as f64;
    let coefficients: Vec<u64> = fa[..a_limbs + b_limbs]
        .par_iter()
        .map(|c| (c.re * norm).round().max(0.0) as u64)
        .collect();

    gather(&coefficients, width)
}

/// Lays `n` out as a `size`-sample real signal of `width`-bit limbs.
fn spread(n: &UBig, width: usize, size: usize) -> Vec<Complex64> {
    let bytes = n.to_le_bytes();
    let limbs = n.bit_len().div_ceil(width);
    let mut signal = vec![Complex64::new(0.0, 0.0); size];
    signal[..limbs]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, sample)| sample.re = read_bits(&bytes, i * width, width) as f64);
    signal
}

/// Reads `width` bits of a little-endian byte string starting at bit `offset`.
///
/// Bits past the end read as zero.
fn read_bits(bytes: &[u8], offset: usize, width: usize) -> u64 {
    let mut value = 0u64;
    let mut read = 0;
    while read < width {
        let pos = offset + read;
        let Some(&byte) = bytes.get(pos / 8) else {
            break;
        };
        let shift = pos % 8;
        let take = (8 - shift).min(width - read);
        let bits = (byte >> shift) as u64 & ((1u64 << take) - 1);
        value |= bits << read;
        read += take;
    }
    value
}

/// Resolves carries between `width`-bit coefficients and builds the integer.
fn gather(coefficients: &[u64], width: usize) -> UBig {
    let mask = (1u128 << width) - 1;
    let mut limbs = Vec::with_capacity(coefficients.len() + 8);
    let mut carry: u128 = 0;
    for &c in coefficients {
        carry += c as u128;
        limbs.push((carry & mask) as u64);
        carry >>= width;
    }
    while carry > 0 {
        limbs.push((carry & mask) as u64);
        carry >>= width;
    }
    UBig::from_le_bytes(&pack_limbs(&limbs, width))
}

/// Concatenates `width`-bit limbs (least significant first) into bytes.
fn pack_limbs(limbs: &[u64], width: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; (limbs.len() * width).div_ceil(8)];
    for (i, &limb) in limbs.iter().enumerate() {
        let mut pos = i * width;
        let mut value = limb;
        let mut left = width;
        while left > 0 {
            let shift = pos % 8;
            let take = (8 - shift).min(left);
            bytes[pos / 8] |= ((value & ((1u64 << take) - 1)) as u8) << shift;
            value >>= take;
            pos += take;
            left -= take;
        }
    }
    bytes
}
