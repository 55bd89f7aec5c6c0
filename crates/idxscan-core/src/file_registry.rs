//! Per-file chunk references.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Dense digest indices referenced by one index file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    /// In on-disk order
    refs: Vec<u32>,
    unique: u32,
}

impl FileRecord {
    pub fn references(&self) -> &[u32] {
        &self.refs
    }

    pub fn reference_count(&self) -> usize {
        self.refs.len()
    }

    /// Distinct indices, as of the last [`FileRegistry::finalize_dedup`]
    pub fn unique_chunks(&self) -> u32 {
        self.unique
    }

    /// `references / unique_chunks`, or 0.0 when there are no unique chunks
    pub fn dedup_ratio(&self) -> f64 {
        if self.unique == 0 {
            return 0.0;
        }
        self.refs.len() as f64 / self.unique as f64
    }

    fn recompute_unique(&mut self) {
        let distinct: HashSet<u32> = self.refs.iter().copied().collect();
        self.unique = distinct.len() as u32;
    }
}

/// One row of the dedup report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDedup {
    pub path: PathBuf,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: HashMap<PathBuf, FileRecord>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `index` to the reference list of `path`, creating the record
    /// on first use.
    pub fn add_reference(&mut self, path: &Path, index: u32) {
        match self.files.get_mut(path) {
            Some(record) => record.refs.push(index),
            None => {
                self.files.insert(
                    path.to_owned(),
                    FileRecord {
                        refs: vec![index],
                        unique: 0,
                    },
                );
            }
        }
    }

    /// Recompute the unique-chunk count of `path`. Returns it, or `None`
    /// for an unknown path.
    pub fn finalize_dedup(&mut self, path: &Path) -> Option<u32> {
        let record = self.files.get_mut(path)?;
        record.recompute_unique();
        Some(record.unique)
    }

    pub fn finalize_all(&mut self) {
        for record in self.files.values_mut() {
            record.recompute_unique();
        }
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &FileRecord)> {
        self.files.iter().map(|(p, r)| (p.as_path(), r))
    }

    /// The `n` files with the highest dedup ratio; ties ordered by path.
    pub fn top_by_dedup_ratio(&self, n: usize) -> Vec<FileDedup> {
        let mut rows: Vec<FileDedup> = self
            .iter()
            .map(|(path, record)| FileDedup {
                path: path.to_owned(),
                ratio: record.dedup_ratio(),
            })
            .collect();
        rows.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.path.cmp(&b.path)));
        rows.truncate(n);
        rows
    }
}
