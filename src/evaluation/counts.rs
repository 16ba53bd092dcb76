//! Co-occurrence counts and their aggregation across documents

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Tally of one document (or a whole run)
///
/// `first_only` counts hypothesis nodes without a matching reference node
/// (false positives, or misses in hit/miss mode), `second_only` counts
/// reference nodes without a matching hypothesis node and `both` counts
/// matches. Addition is associative and commutative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOccurrenceCounts {
    pub first_only: u64,
    pub second_only: u64,
    pub both: u64,
}

impl CoOccurrenceCounts {
    pub fn new(first_only: u64, second_only: u64, both: u64) -> Self {
        Self {
            first_only,
            second_only,
            both,
        }
    }

    pub fn increment_first_only(&mut self) {
        self.first_only += 1;
    }

    pub fn increment_second_only(&mut self) {
        self.second_only += 1;
    }

    pub fn increment_both(&mut self) {
        self.both += 1;
    }

    pub fn total(&self) -> u64 {
        self.first_only + self.second_only + self.both
    }

    /// both / (both + first_only)
    pub fn precision(&self) -> Option<f64> {
        ratio(self.both, self.both + self.first_only)
    }

    /// both / (both + second_only)
    pub fn recall(&self) -> Option<f64> {
        ratio(self.both, self.both + self.second_only)
    }

    /// 2·both / (2·both + first_only + second_only)
    pub fn f_measure(&self) -> Option<f64> {
        ratio(2 * self.both, 2 * self.both + self.first_only + self.second_only)
    }

    /// Hits over hits plus misses, for hit/miss runs
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.both, self.both + self.first_only)
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

impl Add for CoOccurrenceCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            first_only: self.first_only + other.first_only,
            second_only: self.second_only + other.second_only,
            both: self.both + other.both,
        }
    }
}

impl AddAssign for CoOccurrenceCounts {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for CoOccurrenceCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Running total of per-document counts
///
/// Consumed by [`Aggregator::finish`], so a run summarizes once.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    total: CoOccurrenceCounts,
    documents: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_document(&mut self, counts: CoOccurrenceCounts) {
        self.total += counts;
        self.documents += 1;
    }

    pub fn total(&self) -> CoOccurrenceCounts {
        self.total
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Final totals and the number of documents merged
    pub fn finish(self) -> (CoOccurrenceCounts, usize) {
        (self.total, self.documents)
    }
}
