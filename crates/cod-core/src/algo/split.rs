use crate::config::chudnovsky;
use crate::{CancelToken, PiError, PiInt, PiOps, Triple};

use super::progress::ProgressTracker;

/// Optional observers threaded through the recursion.
///
/// Both are checked at split boundaries only, never inside big-integer
/// arithmetic.
#[derive(Clone, Copy, Default)]
pub struct SplitHooks<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub progress: Option<&'a ProgressTracker<'a>>,
}

impl<'a> SplitHooks<'a> {
    /// Fails with `PiError::Cancelled` once the token has been triggered.
    #[inline]
    pub(crate) fn checkpoint(&self) -> Result<(), PiError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(PiError::Cancelled),
            _ => Ok(()),
        }
    }

    #[inline]
    pub(crate) fn node_done(&self, terms: u64) {
        if let Some(progress) = self.progress {
            progress.complete_node(terms);
        }
    }
}

/// Computes the triple of the single term `a`.
///
/// # Formulas
///
/// - $P(a, a+1) = -(6a - 5)(2a - 1)(6a - 1)$
/// - $Q(a, a+1) = 10939058860032000 \cdot a^3$
/// - $R(a, a+1) = P(a, a+1) \cdot (545140134a + 13591409)$
///
/// Every factor is lifted to `PiInt` first, so any `a` up to `u64::MAX` is
/// exact.
///
/// # Example
/// ```
/// use cod_core::algo::split::base_triple;
/// use cod_core::PiInt;
///
/// let t = base_triple(1);
/// assert_eq!(t.q, PiInt::from(10_939_058_860_032_000u64));
/// assert_eq!(t.r, PiInt::from(-2_793_657_715i128));
/// ```
#[inline]
pub fn base_triple(a: u64) -> Triple {
    let x = PiInt::from(a);
    let six_x = PiInt::from(6u32).product(&x);
    let f1 = six_x.clone() - PiInt::from(5u32);
    let f2 = PiInt::from(2u32).product(&x) - PiInt::from(1u32);
    let f3 = six_x - PiInt::from(1u32);
    let p = -f1.product(&f2).product(&f3);

    let q = PiInt::from(chudnovsky::Q_FACTOR).product(&x.power(3));
    let linear = PiInt::from(chudnovsky::LINEAR_A).product(&x) + PiInt::from(chudnovsky::LINEAR_B);
    let r = p.product(&linear);
    Triple { p, q, r }
}

/// Combines the triples of `[a, m)` and `[m, b)` into the triple of `[a, b)`.
///
/// # Formulas
///
/// - $P(a, b) = P(a, m) \cdot P(m, b)$
/// - $Q(a, b) = Q(a, m) \cdot Q(m, b)$
/// - $R(a, b) = Q(m, b) \cdot R(a, m) + P(a, m) \cdot R(m, b)$
///
/// The left triple must cover the lower indices.
#[inline]
pub fn combine(left: &Triple, right: &Triple) -> Triple {
    let p = left.p.product(&right.p);
    let q = left.q.product(&right.q);
    let r = right.q.product(&left.r) + left.p.product(&right.r);
    Triple { p, q, r }
}

/// Validates a term range: `start < end` is required.
#[inline]
pub(crate) fn check_range(start: u64, end: u64) -> Result<(), PiError> {
    if start >= end {
        return Err(PiError::InvalidRange { start, end });
    }
    Ok(())
}

/// Computes the triple of `[a, b)` by sequential binary splitting.
///
/// Splits at $m = \lfloor (a+b)/2 \rfloor$ and combines both halves, so
/// operands at every level of the tree have balanced sizes.
///
/// # Errors
/// * `PiError::InvalidRange` if `a >= b`.
///
/// # Example
/// ```
/// use cod_core::algo::split::{binary_split, base_triple};
///
/// assert_eq!(binary_split(5, 6).unwrap(), base_triple(5));
/// assert!(binary_split(6, 6).is_err());
/// ```
pub fn binary_split(a: u64, b: u64) -> Result<Triple, PiError> {
    split_sequential(a, b, SplitHooks::default())
}

/// Sequential recursion with cancellation and progress hooks.
pub fn split_sequential(a: u64, b: u64, hooks: SplitHooks<'_>) -> Result<Triple, PiError> {
    check_range(a, b)?;
    split_unchecked(a, b, hooks)
}

pub(crate) fn split_unchecked(a: u64, b: u64, hooks: SplitHooks<'_>) -> Result<Triple, PiError> {
    hooks.checkpoint()?;

    if a + 1 == b {
        let triple = base_triple(a);
        hooks.node_done(1);
        return Ok(triple);
    }

    let m = a + (b - a) / 2;
    let left = split_unchecked(a, m, hooks)?;
    let right = split_unchecked(m, b, hooks)?;
    let triple = combine(&left, &right);
    hooks.node_done(b - a);
    Ok(triple)
}
