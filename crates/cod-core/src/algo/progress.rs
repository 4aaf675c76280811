//! Progress tracking for the binary-splitting recursion.
//!
//! This module implements a progress estimation system based on the work
//! distribution of the divide-and-conquer tree.
//!
//! # Mathematical Model
//!
//! Combining two halves of a range of $s$ terms multiplies integers whose size
//! grows linearly with $s$, so each node of the tree is charged $s$ work units
//! when it completes (a leaf is charged 1).
//!
//! - **Total Work**: $W(n) = n + W(\lfloor n/2 \rfloor) + W(\lceil n/2 \rceil)$, $W(1) = 1$,
//!   roughly $n \log_2 n$.
//! - **Node Work**: the size of the range the node covers.
//!
//! This model provides a much more accurate progress bar than counting leaves,
//! since the final combine steps take far longer than the first ones.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Function type for reporting progress updates.
pub type ProgressReporter = Box<dyn Fn(f64) + Send + Sync>;

/// Minimum progress increase between two reports.
const REPORT_THRESHOLD: f64 = 0.01;

/// Calculates the total work units for a recursion over `terms` terms.
///
/// Sub-range sizes at each depth take at most two distinct values, so the
/// memoized recursion visits $O(\log n)$ sizes.
pub fn calc_total_work(terms: u64) -> u64 {
    fn work(n: u64, memo: &mut BTreeMap<u64, u64>) -> u64 {
        if n <= 1 {
            return n;
        }
        if let Some(&w) = memo.get(&n) {
            return w;
        }
        let half = n / 2;
        let w = n + work(half, memo) + work(n - half, memo);
        memo.insert(n, w);
        w
    }

    work(terms, &mut BTreeMap::new())
}

/// Shared progress state for one computation.
///
/// Safe to update from several rayon workers; reports are serialized and
/// never decrease.
pub struct ProgressTracker<'a> {
    reporter: &'a ProgressReporter,
    total_work: u64,
    work_done: AtomicU64,
    last_reported: Mutex<f64>,
}

impl<'a> ProgressTracker<'a> {
    /// Creates a tracker for a recursion over `terms` terms.
    pub fn new(terms: u64, reporter: &'a ProgressReporter) -> Self {
        Self {
            reporter,
            total_work: calc_total_work(terms),
            work_done: AtomicU64::new(0),
            last_reported: Mutex::new(-1.0),
        }
    }

    /// Reports the initial 0.0.
    pub fn start(&self) {
        self.report(0.0, true);
    }

    /// Charges the completion of a node covering `terms` terms.
    pub fn complete_node(&self, terms: u64) {
        let done = self.work_done.fetch_add(terms, Ordering::Relaxed) + terms;
        let is_end = done >= self.total_work;
        let progress = if self.total_work == 0 {
            1.0
        } else {
            (done as f64 / self.total_work as f64).min(1.0)
        };
        self.report(progress, is_end);
    }

    /// Returns the fraction of work completed so far.
    pub fn fraction(&self) -> f64 {
        if self.total_work == 0 {
            return 1.0;
        }
        (self.work_done.load(Ordering::Relaxed) as f64 / self.total_work as f64).min(1.0)
    }

    // Report if:
    // 1. It's the very first or the very last step
    // 2. Progress has increased by at least 1% since last report
    fn report(&self, progress: f64, force: bool) {
        let mut last = match self.last_reported.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let significant_change = progress - *last >= REPORT_THRESHOLD;
        if (force && progress > *last) || significant_change {
            (self.reporter)(progress);
            *last = progress;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_calc_total_work() {
        assert_eq!(calc_total_work(0), 0);
        assert_eq!(calc_total_work(1), 1);
        assert_eq!(calc_total_work(2), 4); // 2 + 1 + 1
        assert_eq!(calc_total_work(3), 8); // 3 + W(1) + W(2)
        assert_eq!(calc_total_work(4), 12); // 4 + 4 + 4
    }

    #[test]
    fn test_calc_total_work_large_is_fast() {
        // ~ n log2 n
        let w = calc_total_work(1 << 30);
        assert_eq!(w, (1u64 << 30) * 31);
    }

    #[test]
    fn test_progress_monotonicity_and_bounds() {
        let seen = Arc::new(Mutex::new(Vec::<f64>::new()));
        let sink = seen.clone();
        let reporter: ProgressReporter = Box::new(move |p| sink.lock().unwrap().push(p));
        let tracker = ProgressTracker::new(4, &reporter);

        tracker.start();
        // Leaves, then the two halves, then the root: 4 + 2 + 2 + 4 = 12
        for size in [1, 1, 2, 1, 1, 2, 4] {
            tracker.complete_node(size);
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
        for w in seen.windows(2) {
            assert!(w[1] > w[0], "Progress decreased: {} -> {}", w[0], w[1]);
        }
        for p in seen.iter() {
            assert!((0.0..=1.0).contains(p));
        }
        assert_eq!(tracker.fraction(), 1.0);
    }

    #[test]
    fn test_reports_are_throttled() {
        let count = Arc::new(AtomicU64::new(0));
        let sink = count.clone();
        let terms = 10_000;
        let reporter: ProgressReporter = Box::new(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });
        let tracker = ProgressTracker::new(terms, &reporter);

        for _ in 0..calc_total_work(terms) {
            tracker.complete_node(1);
        }

        // At most one report per percent, plus the final one
        let reports = count.load(Ordering::Relaxed);
        assert!(reports <= 102, "Too many reports: {}", reports);
        assert!(reports >= 50, "Too few reports: {}", reports);
    }
}
