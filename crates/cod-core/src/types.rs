use std::fmt::{Debug, Display};
use std::ops::{Add, Neg, Sub};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error type for pi calculations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PiError {
    /// The binary-splitting engine was asked for an empty or reversed range.
    InvalidRange { start: u64, end: u64 },
    /// The requested digit count is not a positive integer.
    InvalidDigitCount { digits: i64 },
    /// The request would need more memory than the configured safe limit.
    ResourceExhausted {
        required_bytes: u64,
        limit_bytes: u64,
    },
    /// An arithmetic sanity check failed.
    ComputationError(String),
    /// The computation observed a cancellation request.
    Cancelled,
}

impl Display for PiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiError::InvalidRange { start, end } => {
                write!(f, "Invalid term range [{}, {})", start, end)
            }
            PiError::InvalidDigitCount { digits } => {
                write!(f, "Invalid digit count {} (must be at least 1)", digits)
            }
            PiError::ResourceExhausted {
                required_bytes,
                limit_bytes,
            } => write!(
                f,
                "Estimated memory requirement {} bytes exceeds limit {} bytes",
                required_bytes, limit_bytes
            ),
            PiError::ComputationError(msg) => write!(f, "Computation failed: {}", msg),
            PiError::Cancelled => write!(f, "Computation cancelled"),
        }
    }
}

impl std::error::Error for PiError {}

// ============================================================================
// Evaluation Strategy
// ============================================================================

/// How the binary-splitting recursion is evaluated.
///
/// Every strategy evaluates the same recursion and yields identical digits;
/// they differ only in how the two halves of each split are scheduled.
/// Shared between CLI and Server for consistent naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Evaluation {
    /// Depth-first, single thread.
    #[cfg_attr(feature = "serde", serde(rename = "seq", alias = "sequential"))]
    Sequential,

    /// Both halves of every large split run concurrently on the rayon pool.
    #[cfg_attr(feature = "serde", serde(rename = "par", alias = "parallel"))]
    Parallel,

    /// Parallel for large term ranges, sequential otherwise.
    ///
    /// Uses `config::thresholds::ADAPTIVE_PARALLEL_TERMS`.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "adaptive"))]
    Adaptive,
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evaluation::Sequential => write!(f, "Sequential"),
            Evaluation::Parallel => write!(f, "Parallel"),
            Evaluation::Adaptive => write!(f, "Adaptive"),
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag shared between a caller and a computation.
///
/// The engine checks it at every split boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Term Triple
// ============================================================================

/// The `(P, Q, R)` integers of one term index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub p: PiInt,
    pub q: PiInt,
    pub r: PiInt,
}

/// Trait defining the operations the engine and the assembler need.
/// This allows abstracting over `ibig::IBig` and `rug::Integer`.
///
/// Binary operators on references return different types in the two
/// libraries, so products and quotients go through the trait methods.
pub trait PiOps:
    Sized
    + Clone
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + From<u32>
    + From<u64>
    + From<i128>
    + From<u128>
{
    /// Returns the number of bits of the magnitude.
    fn magnitude_bits(&self) -> usize;

    /// Computes `self * rhs`.
    fn product(&self, rhs: &Self) -> Self;

    /// Computes `self / rhs`, truncated toward zero.
    fn quotient(&self, rhs: &Self) -> Self;

    /// Computes `self^exp`.
    fn power(&self, exp: u32) -> Self;

    /// Floor of the square root of the magnitude.
    fn isqrt(&self) -> Self;

    /// Computes `self * 2^bits`.
    fn shl_bits(self, bits: usize) -> Self;

    /// Computes `floor(self / 2^bits)`.
    fn shr_bits(self, bits: usize) -> Self;

    /// Returns true if the number is negative.
    fn is_negative(&self) -> bool {
        *self < Self::from(0u32)
    }
}

// ----------------------------------------------------------------------------
// IMPL: ibig::IBig
// ----------------------------------------------------------------------------
#[cfg(not(feature = "gmp"))]
pub type PiInt = ibig::IBig;

#[cfg(not(feature = "gmp"))]
impl PiOps for ibig::IBig {
    #[inline]
    fn magnitude_bits(&self) -> usize {
        use ibig::ops::UnsignedAbs;
        self.unsigned_abs().bit_len()
    }

    #[inline]
    fn product(&self, rhs: &Self) -> Self {
        crate::algo::fft::multiply(self, rhs)
    }

    #[inline]
    fn quotient(&self, rhs: &Self) -> Self {
        self / rhs
    }

    #[inline]
    fn power(&self, exp: u32) -> Self {
        ibig::IBig::pow(self, exp as usize)
    }

    fn isqrt(&self) -> Self {
        use ibig::ops::UnsignedAbs;
        ibig::IBig::from(isqrt_ubig(&self.unsigned_abs()))
    }

    #[inline]
    fn shl_bits(self, bits: usize) -> Self {
        self << bits
    }

    #[inline]
    fn shr_bits(self, bits: usize) -> Self {
        self >> bits
    }
}

/// Newton iteration for `floor(sqrt(n))`.
///
/// Starts from a power of two at or above the root, so the iterates decrease
/// monotonically and the first non-decreasing step marks the floor.
#[cfg(not(feature = "gmp"))]
fn isqrt_ubig(n: &ibig::UBig) -> ibig::UBig {
    let bits = n.bit_len();
    if bits == 0 {
        return ibig::UBig::from(0u32);
    }

    let mut x = ibig::UBig::from(1u32) << bits.div_ceil(2);
    loop {
        let y = (&x + n / &x) >> 1usize;
        if y >= x {
            return x;
        }
        x = y;
    }
}

// ----------------------------------------------------------------------------
// IMPL: rug::Integer (GMP)
// ----------------------------------------------------------------------------
#[cfg(feature = "gmp")]
pub type PiInt = rug::Integer;

#[cfg(feature = "gmp")]
impl PiOps for rug::Integer {
    #[inline]
    fn magnitude_bits(&self) -> usize {
        self.significant_bits() as usize
    }

    #[inline]
    fn product(&self, rhs: &Self) -> Self {
        // GMP switches to its own FFT multiplication for large operands.
        rug::Integer::from(self * rhs)
    }

    #[inline]
    fn quotient(&self, rhs: &Self) -> Self {
        rug::Integer::from(self / rhs)
    }

    #[inline]
    fn power(&self, exp: u32) -> Self {
        <rug::Integer as rug::ops::Pow<u32>>::pow(self.clone(), exp)
    }

    fn isqrt(&self) -> Self {
        self.clone().abs().sqrt()
    }

    #[inline]
    fn shl_bits(self, bits: usize) -> Self {
        self << bits as u32
    }

    #[inline]
    fn shr_bits(self, bits: usize) -> Self {
        self >> bits as u32
    }
}
