//! Row-block decomposition of an N×N matrix over P workers.
//!
//! Every rank derives the same [`PartitionPlan`] from `(N, P)` alone; the plan
//! is never transmitted. This saves a round of communication, but it means N
//! and P must come from a single source per run: a rank that computes a
//! different plan disagrees on segment boundaries with everyone else.

use std::ops::Range;

use crate::Error;

/// A contiguous range of rows owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBlock {
    pub start: usize,
    pub count: usize,
}

impl RowBlock {
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Row counts and row offsets for every rank, in rank order.
///
/// Invariants: `offsets[0] == 0`, each offset is the prefix sum of the
/// counts before it, the counts sum to N, and each count is `N / P` or
/// `N / P + 1` with the larger counts on the lowest ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    n: usize,
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

/// Computes the row assignment of `n` rows over `workers` ranks.
///
/// The first `n % workers` ranks receive one extra row. When `workers > n`
/// the trailing ranks receive empty blocks.
pub fn plan(n: usize, workers: usize) -> Result<PartitionPlan, Error> {
    if workers == 0 {
        return Err(Error::DegenerateSize(workers));
    }

    let base = n / workers;
    let extra = n % workers;
    let counts: Vec<usize> = (0..workers)
        .map(|rank| if rank < extra { base + 1 } else { base })
        .collect();
    let offsets = counts
        .iter()
        .scan(0, |next, &count| {
            let offset = *next;
            *next += count;
            Some(offset)
        })
        .collect();

    Ok(PartitionPlan { n, counts, offsets })
}

impl PartitionPlan {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn workers(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The rows owned by `rank`.
    ///
    /// # Panics
    ///
    /// Panics if `rank >= self.workers()`.
    pub fn block(&self, rank: usize) -> RowBlock {
        RowBlock {
            start: self.offsets[rank],
            count: self.counts[rank],
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = RowBlock> + '_ {
        (0..self.workers()).map(|rank| self.block(rank))
    }

    /// Per-rank element counts for rows of `width` elements.
    pub fn element_counts(&self, width: usize) -> Vec<usize> {
        self.counts.iter().map(|c| c * width).collect()
    }

    /// Per-rank element offsets for rows of `width` elements.
    pub fn element_offsets(&self, width: usize) -> Vec<usize> {
        self.offsets.iter().map(|o| o * width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn each_case(mut f: impl FnMut(usize, usize, PartitionPlan)) {
        for n in 0..=48 {
            for p in 1..=13 {
                f(n, p, plan(n, p).unwrap());
            }
        }
    }

    #[test]
    fn counts_sum_to_n() {
        each_case(|n, p, plan| {
            assert_eq!(plan.counts().iter().sum::<usize>(), n, "n={} p={}", n, p);
            assert_eq!(plan.workers(), p);
        });
    }

    #[test]
    fn counts_are_balanced_and_non_increasing() {
        each_case(|n, p, plan| {
            let base = n / p;
            for &count in plan.counts() {
                assert!(count == base || count == base + 1, "n={} p={}", n, p);
            }
            for pair in plan.counts().windows(2) {
                assert!(pair[0] >= pair[1], "n={} p={}", n, p);
            }
            let larger = plan.counts().iter().filter(|&&c| c == base + 1).count();
            assert_eq!(larger, n % p);
        });
    }

    #[test]
    fn offsets_are_prefix_sums() {
        each_case(|n, _, plan| {
            let mut expected = 0;
            for block in plan.blocks() {
                assert_eq!(block.start, expected);
                expected = block.end();
            }
            assert_eq!(expected, n);
        });
    }

    #[test]
    fn more_workers_than_rows_leaves_empty_blocks() {
        let plan = plan(3, 7).unwrap();
        assert_eq!(plan.counts(), &[1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(plan.offsets(), &[0, 1, 2, 3, 3, 3, 3]);
        assert!(plan.blocks().filter(RowBlock::is_empty).count() >= 7 - 3);
    }

    #[test]
    fn zero_rows() {
        let plan = plan(0, 4).unwrap();
        assert_eq!(plan.counts(), &[0, 0, 0, 0]);
        assert_eq!(plan.offsets(), &[0, 0, 0, 0]);
    }

    #[test]
    fn uneven_split_favours_low_ranks() {
        let plan = plan(5, 3).unwrap();
        assert_eq!(plan.counts(), &[2, 2, 1]);
        assert_eq!(plan.offsets(), &[0, 2, 4]);
        assert_eq!(plan.element_counts(5), vec![10, 10, 5]);
        assert_eq!(plan.element_offsets(5), vec![0, 10, 20]);
        assert_eq!(plan.block(2).range(), 4..5);
    }

    #[test]
    fn plan_is_deterministic() {
        each_case(|n, p, first| {
            assert_eq!(first, plan(n, p).unwrap());
        });
    }

    #[test]
    fn zero_workers_is_degenerate() {
        assert!(matches!(plan(10, 0), Err(Error::DegenerateSize(0))));
    }
}
