//! # idxscan-format
//!
//! Readers and writers for the two fixed-layout backup index formats.
//!
//! ## File Layout
//!
//! ```text
//! +-------------------+
//! | Header (4096B)    |  magic, uuid, ctime, index checksum, ... reserved
//! +-------------------+
//! | Body              |  .fidx: [digest; 32B] × N
//! |                   |  .didx: [offset u64 LE; digest 32B] × N
//! +-------------------+
//! ```
//!
//! Bodies carry no length prefix. They are read until end-of-file and a
//! trailing partial record is dropped without error.

mod body;
mod header;

pub use body::{
    decode_chunk_list_body, decode_chunk_offset_body, ChunkOffsetEntry, CHUNK_OFFSET_ENTRY_SIZE,
};
pub use header::{
    ChunkListHeader, ChunkOffsetHeader, CHUNK_LIST_MAGIC, CHUNK_LIST_RESERVED_SIZE,
    CHUNK_OFFSET_MAGIC, CHUNK_OFFSET_RESERVED_SIZE, CSUM_SIZE, HEADER_SIZE, MAGIC_SIZE, UUID_SIZE,
};

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Size of a content digest in bytes
pub const DIGEST_SIZE: usize = 32;

/// File extension of chunk-list (fixed chunk size) indexes
pub const CHUNK_LIST_EXT: &str = "fidx";
/// File extension of chunk-offset (dynamic chunk size) indexes
pub const CHUNK_OFFSET_EXT: &str = "didx";

/// Errors that can occur while reading an index file
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("invalid {kind} magic: {found:?}")]
    InvalidMagic { kind: IndexKind, found: [u8; MAGIC_SIZE] },

    #[error("header truncated: got {len} of {} bytes", HEADER_SIZE)]
    ShortHeader { len: usize },

    #[error("not an index file: {0}")]
    UnknownKind(PathBuf),
}

impl FormatError {
    /// True when the bytes themselves are malformed (as opposed to an I/O failure).
    pub fn is_invalid_format(&self) -> bool {
        matches!(
            self,
            FormatError::InvalidMagic { .. } | FormatError::ShortHeader { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;

// ============================================================================
// Digest
// ============================================================================

/// 32-byte content digest of a chunk
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest(pub [u8; DIGEST_SIZE]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// First two bytes as a big-endian `u16`, used as a histogram bucket.
    #[inline]
    pub fn prefix(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid digest hex"))
    }
}

// ============================================================================
// Index Kind
// ============================================================================

/// Which of the two index formats a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// `.fidx`: fixed-size chunks, body is a digest list
    ChunkList,
    /// `.didx`: dynamic chunks, body is (offset, digest) pairs
    ChunkOffset,
}

impl IndexKind {
    /// Classify a path by its extension. Returns `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            CHUNK_LIST_EXT => Some(IndexKind::ChunkList),
            CHUNK_OFFSET_EXT => Some(IndexKind::ChunkOffset),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            IndexKind::ChunkList => CHUNK_LIST_EXT,
            IndexKind::ChunkOffset => CHUNK_OFFSET_EXT,
        }
    }

    pub fn magic(&self) -> &'static [u8; MAGIC_SIZE] {
        match self {
            IndexKind::ChunkList => &CHUNK_LIST_MAGIC,
            IndexKind::ChunkOffset => &CHUNK_OFFSET_MAGIC,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ============================================================================
// Decoded Indexes
// ============================================================================

/// A decoded `.fidx` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkListIndex {
    pub header: ChunkListHeader,
    pub digests: Vec<Digest>,
}

impl ChunkListIndex {
    /// Build an index over `digests` with a fresh header.
    ///
    /// The logical size is `digests.len() * chunk_size`.
    pub fn new(digests: Vec<Digest>, chunk_size: u64) -> Self {
        let mut header = ChunkListHeader::new();
        header.chunk_size = chunk_size;
        header.size = digests.len() as u64 * chunk_size;
        Self { header, digests }
    }

    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let header = ChunkListHeader::decode(reader)?;
        let digests = decode_chunk_list_body(reader)?;
        Ok(Self { header, digests })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.to_bytes())?;
        for digest in &self.digests {
            writer.write_all(digest.as_bytes())?;
        }
        Ok(())
    }
}

/// A decoded `.didx` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOffsetIndex {
    pub header: ChunkOffsetHeader,
    pub entries: Vec<ChunkOffsetEntry>,
}

impl ChunkOffsetIndex {
    /// Build an index from `(chunk_len, digest)` pairs; offsets are the
    /// running end offset of each chunk.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = (u64, Digest)>,
    {
        let mut end = 0u64;
        let entries = chunks
            .into_iter()
            .map(|(len, digest)| {
                end += len;
                ChunkOffsetEntry {
                    offset: end,
                    digest,
                }
            })
            .collect();
        Self {
            header: ChunkOffsetHeader::new(),
            entries,
        }
    }

    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let header = ChunkOffsetHeader::decode(reader)?;
        let entries = decode_chunk_offset_body(reader)?;
        Ok(Self { header, entries })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.to_bytes())?;
        for entry in &self.entries {
            writer.write_all(&entry.to_bytes())?;
        }
        Ok(())
    }
}

/// Either index format, as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFile {
    ChunkList(ChunkListIndex),
    ChunkOffset(ChunkOffsetIndex),
}

impl IndexFile {
    /// Open and fully decode the index at `path`, picking the format from
    /// the file extension. The handle is closed before returning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let kind =
            IndexKind::from_path(path).ok_or_else(|| FormatError::UnknownKind(path.to_owned()))?;
        let file = File::open(path).map_err(|source| FormatError::Open {
            path: path.to_owned(),
            source,
        })?;
        Self::decode(kind, &mut BufReader::new(file))
    }

    pub fn decode<R: Read>(kind: IndexKind, reader: &mut R) -> Result<Self> {
        match kind {
            IndexKind::ChunkList => ChunkListIndex::decode(reader).map(IndexFile::ChunkList),
            IndexKind::ChunkOffset => ChunkOffsetIndex::decode(reader).map(IndexFile::ChunkOffset),
        }
    }

    /// Write the index to `path`, truncating any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        match self {
            IndexFile::ChunkList(index) => index.write_to(&mut writer)?,
            IndexFile::ChunkOffset(index) => index.write_to(&mut writer)?,
        }
        writer.flush()
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            IndexFile::ChunkList(_) => IndexKind::ChunkList,
            IndexFile::ChunkOffset(_) => IndexKind::ChunkOffset,
        }
    }

    pub fn uuid(&self) -> &[u8; UUID_SIZE] {
        match self {
            IndexFile::ChunkList(index) => &index.header.uuid,
            IndexFile::ChunkOffset(index) => &index.header.uuid,
        }
    }

    pub fn ctime(&self) -> i64 {
        match self {
            IndexFile::ChunkList(index) => index.header.ctime,
            IndexFile::ChunkOffset(index) => index.header.ctime,
        }
    }

    pub fn digest_count(&self) -> usize {
        match self {
            IndexFile::ChunkList(index) => index.digests.len(),
            IndexFile::ChunkOffset(index) => index.entries.len(),
        }
    }

    /// Digests in on-disk order
    pub fn digests(&self) -> Digests<'_> {
        match self {
            IndexFile::ChunkList(index) => Digests::ChunkList(index.digests.iter()),
            IndexFile::ChunkOffset(index) => Digests::ChunkOffset(index.entries.iter()),
        }
    }
}

impl From<ChunkListIndex> for IndexFile {
    fn from(index: ChunkListIndex) -> Self {
        IndexFile::ChunkList(index)
    }
}

impl From<ChunkOffsetIndex> for IndexFile {
    fn from(index: ChunkOffsetIndex) -> Self {
        IndexFile::ChunkOffset(index)
    }
}

/// Iterator over the digests of an [`IndexFile`]
pub enum Digests<'a> {
    ChunkList(std::slice::Iter<'a, Digest>),
    ChunkOffset(std::slice::Iter<'a, ChunkOffsetEntry>),
}

impl<'a> Iterator for Digests<'a> {
    type Item = &'a Digest;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Digests::ChunkList(iter) => iter.next(),
            Digests::ChunkOffset(iter) => iter.next().map(|entry| &entry.digest),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Digests::ChunkList(iter) => iter.size_hint(),
            Digests::ChunkOffset(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for Digests<'_> {}

/// Fill `buf` from `reader`, stopping early only at end-of-stream.
///
/// Returns the number of bytes read; a value below `buf.len()` means the
/// stream ended.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
