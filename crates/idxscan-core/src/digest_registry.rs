//! Global digest registry.
//!
//! Every distinct digest gets a dense `u32` index on first sight. The
//! registry also keeps a reference count per index and two prefix
//! histograms bucketed by the first two digest bytes.
//!
//! There is no internal locking: [`ScanSession`](crate::ScanSession) owns
//! the registry behind its lock and serializes all writers.

use std::collections::HashMap;

use idxscan_format::Digest;
use serde::Serialize;

/// Number of prefix histogram buckets (one per big-endian `u16`)
pub const PREFIX_BUCKETS: usize = 1 << 16;

/// One row of the occurrence report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DigestOccurrence {
    pub digest: Digest,
    pub index: u32,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct DigestRegistry {
    index: HashMap<Digest, u32>,
    /// index -> digest
    digests: Vec<Digest>,
    /// index -> reference count
    ref_counts: Vec<u64>,
    distinct_prefix: Box<[u64]>,
    occurrence_prefix: Box<[u64]>,
    total_references: u64,
}

impl DigestRegistry {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            digests: Vec::new(),
            ref_counts: Vec::new(),
            distinct_prefix: vec![0; PREFIX_BUCKETS].into_boxed_slice(),
            occurrence_prefix: vec![0; PREFIX_BUCKETS].into_boxed_slice(),
            total_references: 0,
        }
    }

    /// Record one occurrence of `digest` and return its dense index.
    pub fn add(&mut self, digest: Digest) -> u32 {
        let bucket = digest.prefix() as usize;
        self.occurrence_prefix[bucket] += 1;
        self.total_references += 1;

        if let Some(&idx) = self.index.get(&digest) {
            self.ref_counts[idx as usize] += 1;
            return idx;
        }

        let idx = self.digests.len() as u32;
        self.index.insert(digest, idx);
        self.digests.push(digest);
        self.ref_counts.push(1);
        self.distinct_prefix[bucket] += 1;
        idx
    }

    /// Number of distinct digests
    pub fn count(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Number of `add` calls so far
    pub fn total_references(&self) -> u64 {
        self.total_references
    }

    pub fn index_of(&self, digest: &Digest) -> Option<u32> {
        self.index.get(digest).copied()
    }

    pub fn digest_at(&self, index: u32) -> Option<Digest> {
        self.digests.get(index as usize).copied()
    }

    pub fn reference_count(&self, index: u32) -> Option<u64> {
        self.ref_counts.get(index as usize).copied()
    }

    /// `(digest, index, count)` for every registered digest, in index order.
    pub fn iter(&self) -> impl Iterator<Item = DigestOccurrence> + '_ {
        self.digests
            .iter()
            .zip(&self.ref_counts)
            .enumerate()
            .map(|(i, (&digest, &count))| DigestOccurrence {
                digest,
                index: i as u32,
                count,
            })
    }

    /// The `n` most referenced digests, count descending then index ascending.
    pub fn top_by_reference_count(&self, n: usize) -> Vec<DigestOccurrence> {
        let mut rows: Vec<DigestOccurrence> = self.iter().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.index.cmp(&b.index)));
        rows.truncate(n);
        rows
    }

    /// Distinct digests per two-byte prefix
    pub fn distinct_histogram(&self) -> &[u64] {
        &self.distinct_prefix
    }

    /// Occurrences per two-byte prefix
    pub fn occurrence_histogram(&self) -> &[u64] {
        &self.occurrence_prefix
    }
}

impl Default for DigestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
