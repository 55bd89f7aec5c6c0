//! Reports over a registry snapshot.
//!
//! Everything here is a pure function of [`Registries`]; callers hold the
//! session read lock for as long as they need a consistent view. The
//! serializable projections back the HTTP API, the `write_*` renderers the
//! CLI output.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::{DigestOccurrence, FileDedup, Registries};

/// Global totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total_unique_digests: usize,
    pub total_files: usize,
    pub total_references: u64,
}

impl Summary {
    pub fn of(registries: &Registries) -> Self {
        Self {
            total_unique_digests: registries.digests.count(),
            total_files: registries.files.len(),
            total_references: registries.digests.total_references(),
        }
    }

    /// `total_references / total_unique_digests`, 0.0 for an empty scan
    pub fn dedup_ratio(&self) -> f64 {
        if self.total_unique_digests == 0 {
            return 0.0;
        }
        self.total_references as f64 / self.total_unique_digests as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DigestCount {
    pub digest_index: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkEntry {
    pub digest: String,
    pub digest_index: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Lossy UTF-8 rendering of the path
    pub filename: String,
    pub num_ref_chunks: usize,
    pub unique_chunks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReferences {
    pub ref_chunks: Vec<u32>,
}

/// Both prefix histograms, 65536 buckets each
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixHistograms {
    pub accu_count: Vec<u64>,
    pub accu_ref_count: Vec<u64>,
}

/// Reference count of every digest, in dense index order.
pub fn digest_counts(registries: &Registries) -> Vec<DigestCount> {
    registries
        .digests
        .iter()
        .map(|occ| DigestCount {
            digest_index: occ.index,
            count: occ.count,
        })
        .collect()
}

/// Digests whose hex form starts with `prefix` (case-insensitive; empty
/// matches everything), in dense index order.
pub fn chunks_with_prefix(registries: &Registries, prefix: &str) -> Vec<ChunkEntry> {
    let prefix = prefix.to_ascii_lowercase();
    registries
        .digests
        .iter()
        .map(|occ| (occ.digest.to_hex(), occ))
        .filter(|(hex, _)| hex.starts_with(&prefix))
        .map(|(digest, occ)| ChunkEntry {
            digest,
            digest_index: occ.index,
            count: occ.count,
        })
        .collect()
}

/// One entry per recorded file, ordered by path.
pub fn file_entries(registries: &Registries) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = registries
        .files
        .iter()
        .map(|(path, record)| FileEntry {
            filename: path.to_string_lossy().into_owned(),
            num_ref_chunks: record.reference_count(),
            unique_chunks: record.unique_chunks(),
        })
        .collect();
    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    entries
}

/// Look up a file by the name [`file_entries`] reports for it. Paths that
/// are not valid UTF-8 match on their lossy rendering.
pub fn file_references(registries: &Registries, filename: &str) -> Option<FileReferences> {
    let record = match registries.files.get(Path::new(filename)) {
        Some(record) => record,
        None => registries
            .files
            .iter()
            .find(|(path, _)| path.to_string_lossy() == filename)
            .map(|(_, record)| record)?,
    };
    Some(FileReferences {
        ref_chunks: record.references().to_vec(),
    })
}

pub fn prefix_histograms(registries: &Registries) -> PrefixHistograms {
    PrefixHistograms {
        accu_count: registries.digests.distinct_histogram().to_vec(),
        accu_ref_count: registries.digests.occurrence_histogram().to_vec(),
    }
}

// ============================================================================
// Text renderers
// ============================================================================

pub fn write_occurrences<W: Write>(
    out: &mut W,
    n: usize,
    rows: &[DigestOccurrence],
) -> io::Result<()> {
    writeln!(out, "Top {n} Digest occurrences:")?;
    for row in rows {
        writeln!(out, "{} ({}): {}", row.digest, row.index, row.count)?;
    }
    Ok(())
}

pub fn write_dedup<W: Write>(out: &mut W, n: usize, rows: &[FileDedup]) -> io::Result<()> {
    writeln!(out, "Top {n} highest dedup ratio files:")?;
    for row in rows {
        writeln!(out, "{}: {:.2}", row.path.display(), row.ratio)?;
    }
    Ok(())
}

/// Every file's dense reference list, ordered by path.
pub fn write_references<W: Write>(out: &mut W, registries: &Registries) -> io::Result<()> {
    let mut files: Vec<_> = registries.files.iter().collect();
    files.sort_by(|a, b| a.0.cmp(b.0));

    writeln!(out, "File references for each digest:")?;
    for (path, record) in files {
        write!(out, "{}:", path.display())?;
        for index in record.references() {
            write!(out, " {index}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_summary<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(out, "Total unique digests: {}", summary.total_unique_digests)?;
    writeln!(out, "Total files: {}", summary.total_files)?;
    writeln!(out, "Total references: {}", summary.total_references)?;
    writeln!(out, "Global dedup ratio: {:.2}", summary.dedup_ratio())
}
