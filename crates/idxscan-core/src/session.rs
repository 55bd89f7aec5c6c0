//! Scan session: both registries behind one read/write lock.
//!
//! The scanner is the only writer. Reporting and the API take read locks
//! and may do so while a scan is still running; they then see the
//! registries as of the last fully recorded file.

use std::path::Path;

use idxscan_format::Digest;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::{DigestRegistry, FileRegistry};

/// The two registry facets of one scan
#[derive(Debug, Default)]
pub struct Registries {
    pub digests: DigestRegistry,
    pub files: FileRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every digest of one file, in order, then finalize that
    /// file's unique-chunk count. Returns the number of digests recorded.
    pub fn record_file<'a, I>(&mut self, path: &Path, digests: I) -> usize
    where
        I: IntoIterator<Item = &'a Digest>,
    {
        let mut recorded = 0;
        for digest in digests {
            let index = self.digests.add(*digest);
            self.files.add_reference(path, index);
            recorded += 1;
        }
        self.files.finalize_dedup(path);
        recorded
    }
}

#[derive(Debug, Default)]
pub struct ScanSession {
    inner: RwLock<Registries>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read access to a consistent snapshot
    pub fn read(&self) -> RwLockReadGuard<'_, Registries> {
        self.inner.read()
    }

    /// Record one decoded file under the write lock.
    ///
    /// The lock is held for the whole digest loop so readers never see a
    /// reference count without the matching file reference.
    pub fn record_file<'a, I>(&self, path: &Path, digests: I) -> usize
    where
        I: IntoIterator<Item = &'a Digest>,
    {
        let mut registries = self.inner.write();
        registries.record_file(path, digests)
    }

    /// Consume the session, returning the registries.
    pub fn into_inner(self) -> Registries {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn digest(byte: u8) -> Digest {
        Digest([byte; 32])
    }

    #[test]
    fn test_record_file_updates_both_registries() {
        let session = ScanSession::new();
        let path = Path::new("ct/100/2024-01-01T00:00:00Z/root.pxar.didx");
        let digests = [digest(1), digest(2), digest(1), digest(3)];

        assert_eq!(session.record_file(path, &digests), 4);

        let reg = session.read();
        assert_eq!(reg.digests.count(), 3);
        assert_eq!(reg.digests.total_references(), 4);
        let record = reg.files.get(path).unwrap();
        assert_eq!(record.reference_count(), 4);
        assert_eq!(record.unique_chunks(), 3);
    }

    #[test]
    fn test_empty_file_creates_no_record() {
        let session = ScanSession::new();
        assert_eq!(session.record_file(Path::new("empty.fidx"), std::iter::empty()), 0);
        assert!(session.read().files.is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_files() {
        let session = Arc::new(ScanSession::new());
        let writer = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..200u32 {
                    let path = format!("file_{i}.fidx");
                    let digests: Vec<Digest> = (0..16u8).map(|b| digest(b ^ (i as u8))).collect();
                    session.record_file(Path::new(&path), &digests);
                }
            })
        };

        // Every snapshot must be file-aligned: 16 references per file
        for _ in 0..200 {
            let reg = session.read();
            let files = reg.files.len() as u64;
            assert_eq!(reg.digests.total_references(), files * 16);
        }

        writer.join().unwrap();
        assert_eq!(session.read().files.len(), 200);
    }
}
