//! Index bodies: flat record sequences read until end-of-file.
//!
//! Neither format stores a record count. A trailing read shorter than one
//! record ends the body cleanly; the partial bytes are discarded.

use std::io::Read;

use crate::{read_full, Digest, Result, DIGEST_SIZE};

/// Size of one `.didx` record: u64 offset + digest
pub const CHUNK_OFFSET_ENTRY_SIZE: usize = 8 + DIGEST_SIZE;

/// One `.didx` body record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOffsetEntry {
    /// End offset of the chunk within the archive stream
    pub offset: u64,
    pub digest: Digest,
}

impl ChunkOffsetEntry {
    pub fn from_bytes(buf: &[u8; CHUNK_OFFSET_ENTRY_SIZE]) -> Self {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[..8]);
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&buf[8..]);
        Self {
            offset: u64::from_le_bytes(offset),
            digest: Digest(digest),
        }
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_OFFSET_ENTRY_SIZE] {
        let mut buf = [0u8; CHUNK_OFFSET_ENTRY_SIZE];
        buf[..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..].copy_from_slice(self.digest.as_bytes());
        buf
    }
}

/// Read `.fidx` digests until the stream is exhausted.
pub fn decode_chunk_list_body<R: Read>(reader: &mut R) -> Result<Vec<Digest>> {
    let mut digests = Vec::new();
    let mut buf = [0u8; DIGEST_SIZE];
    while read_full(reader, &mut buf)? == DIGEST_SIZE {
        digests.push(Digest(buf));
    }
    Ok(digests)
}

/// Read `.didx` entries until the stream is exhausted.
pub fn decode_chunk_offset_body<R: Read>(reader: &mut R) -> Result<Vec<ChunkOffsetEntry>> {
    let mut entries = Vec::new();
    let mut buf = [0u8; CHUNK_OFFSET_ENTRY_SIZE];
    while read_full(reader, &mut buf)? == CHUNK_OFFSET_ENTRY_SIZE {
        entries.push(ChunkOffsetEntry::from_bytes(&buf));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn digest(byte: u8) -> Digest {
        Digest([byte; DIGEST_SIZE])
    }

    #[test]
    fn test_chunk_list_body_in_order() {
        let mut bytes = Vec::new();
        for b in [3u8, 1, 2] {
            bytes.extend_from_slice(digest(b).as_bytes());
        }
        let digests = decode_chunk_list_body(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(digests, vec![digest(3), digest(1), digest(2)]);
    }

    #[test]
    fn test_chunk_list_body_drops_partial_tail() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(digest(1).as_bytes());
        bytes.extend_from_slice(digest(2).as_bytes());
        bytes.extend_from_slice(&[9u8; 17]);
        let digests = decode_chunk_list_body(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(digests, vec![digest(1), digest(2)]);
    }

    #[test]
    fn test_empty_bodies() {
        assert!(decode_chunk_list_body(&mut io::empty()).unwrap().is_empty());
        assert!(decode_chunk_offset_body(&mut io::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_offset_body_drops_partial_tail() {
        let entries = [
            ChunkOffsetEntry {
                offset: 4096,
                digest: digest(1),
            },
            ChunkOffsetEntry {
                offset: 9000,
                digest: digest(2),
            },
        ];
        let mut bytes = Vec::new();
        for entry in &entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        // 8-byte offset present, digest cut short
        bytes.extend_from_slice(&[0u8; 8 + 5]);

        let decoded = decode_chunk_offset_body(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_entry_layout_little_endian() {
        let entry = ChunkOffsetEntry {
            offset: 0x0102_0304_0506_0708,
            digest: digest(0xaa),
        };
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(ChunkOffsetEntry::from_bytes(&bytes), entry);
    }

    /// Reader that hands out at most `step` bytes per call
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let mut data = Vec::new();
        for b in 0..10u8 {
            data.extend_from_slice(digest(b).as_bytes());
        }
        let mut reader = Trickle {
            data,
            pos: 0,
            step: 7,
        };
        let digests = decode_chunk_list_body(&mut reader).unwrap();
        assert_eq!(digests.len(), 10);
        assert_eq!(digests[9], digest(9));
    }
}
