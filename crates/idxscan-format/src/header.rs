//! Fixed 4096-byte index headers

use std::io::Read;

use crate::{read_full, FormatError, IndexKind, Result};

/// Both formats use a header of exactly this size
pub const HEADER_SIZE: usize = 4096;
pub const MAGIC_SIZE: usize = 8;
pub const UUID_SIZE: usize = 16;
pub const CSUM_SIZE: usize = 32;

/// Padding after the `.fidx` fields (magic..chunk_size = 80 bytes)
pub const CHUNK_LIST_RESERVED_SIZE: usize = 4016;
/// Padding after the `.didx` fields (magic..checksum = 64 bytes)
pub const CHUNK_OFFSET_RESERVED_SIZE: usize = 4032;

pub const CHUNK_LIST_MAGIC: [u8; MAGIC_SIZE] = [47, 127, 65, 237, 145, 253, 15, 205];
pub const CHUNK_OFFSET_MAGIC: [u8; MAGIC_SIZE] = [28, 145, 78, 165, 25, 186, 179, 205];

const UUID_OFFSET: usize = 8;
const CTIME_OFFSET: usize = 24;
const CSUM_OFFSET: usize = 32;
const SIZE_OFFSET: usize = 64;
const CHUNK_SIZE_OFFSET: usize = 72;
const CHUNK_LIST_RESERVED_OFFSET: usize = 80;
const CHUNK_OFFSET_RESERVED_OFFSET: usize = 64;

/// `.fidx` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkListHeader {
    pub magic: [u8; MAGIC_SIZE],
    pub uuid: [u8; UUID_SIZE],
    /// Creation time, seconds since the Unix epoch
    pub ctime: i64,
    pub index_csum: [u8; CSUM_SIZE],
    /// Logical size of the indexed image
    pub size: u64,
    pub chunk_size: u64,
    pub reserved: Box<[u8; CHUNK_LIST_RESERVED_SIZE]>,
}

impl ChunkListHeader {
    pub fn new() -> Self {
        Self {
            magic: CHUNK_LIST_MAGIC,
            uuid: [0u8; UUID_SIZE],
            ctime: 0,
            index_csum: [0u8; CSUM_SIZE],
            size: 0,
            chunk_size: 0,
            reserved: Box::new([0u8; CHUNK_LIST_RESERVED_SIZE]),
        }
    }

    /// Read one header block from `reader` and validate its magic.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let buf = read_header_block(reader)?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = check_magic(buf, IndexKind::ChunkList)?;
        let mut reserved = Box::new([0u8; CHUNK_LIST_RESERVED_SIZE]);
        reserved.copy_from_slice(&buf[CHUNK_LIST_RESERVED_OFFSET..]);

        Ok(Self {
            magic,
            uuid: read_array(buf, UUID_OFFSET),
            ctime: i64::from_le_bytes(read_array(buf, CTIME_OFFSET)),
            index_csum: read_array(buf, CSUM_OFFSET),
            size: u64::from_le_bytes(read_array(buf, SIZE_OFFSET)),
            chunk_size: u64::from_le_bytes(read_array(buf, CHUNK_SIZE_OFFSET)),
            reserved,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC_SIZE].copy_from_slice(&self.magic);
        buf[UUID_OFFSET..CTIME_OFFSET].copy_from_slice(&self.uuid);
        buf[CTIME_OFFSET..CSUM_OFFSET].copy_from_slice(&self.ctime.to_le_bytes());
        buf[CSUM_OFFSET..SIZE_OFFSET].copy_from_slice(&self.index_csum);
        buf[SIZE_OFFSET..CHUNK_SIZE_OFFSET].copy_from_slice(&self.size.to_le_bytes());
        buf[CHUNK_SIZE_OFFSET..CHUNK_LIST_RESERVED_OFFSET]
            .copy_from_slice(&self.chunk_size.to_le_bytes());
        buf[CHUNK_LIST_RESERVED_OFFSET..].copy_from_slice(&self.reserved[..]);
        buf
    }
}

impl Default for ChunkListHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// `.didx` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOffsetHeader {
    pub magic: [u8; MAGIC_SIZE],
    pub uuid: [u8; UUID_SIZE],
    pub ctime: i64,
    pub index_csum: [u8; CSUM_SIZE],
    pub reserved: Box<[u8; CHUNK_OFFSET_RESERVED_SIZE]>,
}

impl ChunkOffsetHeader {
    pub fn new() -> Self {
        Self {
            magic: CHUNK_OFFSET_MAGIC,
            uuid: [0u8; UUID_SIZE],
            ctime: 0,
            index_csum: [0u8; CSUM_SIZE],
            reserved: Box::new([0u8; CHUNK_OFFSET_RESERVED_SIZE]),
        }
    }

    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let buf = read_header_block(reader)?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = check_magic(buf, IndexKind::ChunkOffset)?;
        let mut reserved = Box::new([0u8; CHUNK_OFFSET_RESERVED_SIZE]);
        reserved.copy_from_slice(&buf[CHUNK_OFFSET_RESERVED_OFFSET..]);

        Ok(Self {
            magic,
            uuid: read_array(buf, UUID_OFFSET),
            ctime: i64::from_le_bytes(read_array(buf, CTIME_OFFSET)),
            index_csum: read_array(buf, CSUM_OFFSET),
            reserved,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC_SIZE].copy_from_slice(&self.magic);
        buf[UUID_OFFSET..CTIME_OFFSET].copy_from_slice(&self.uuid);
        buf[CTIME_OFFSET..CSUM_OFFSET].copy_from_slice(&self.ctime.to_le_bytes());
        buf[CSUM_OFFSET..CHUNK_OFFSET_RESERVED_OFFSET].copy_from_slice(&self.index_csum);
        buf[CHUNK_OFFSET_RESERVED_OFFSET..].copy_from_slice(&self.reserved[..]);
        buf
    }
}

impl Default for ChunkOffsetHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_header_block<R: Read>(reader: &mut R) -> Result<[u8; HEADER_SIZE]> {
    let mut buf = [0u8; HEADER_SIZE];
    let len = read_full(reader, &mut buf)?;
    if len < HEADER_SIZE {
        return Err(FormatError::ShortHeader { len });
    }
    Ok(buf)
}

fn check_magic(buf: &[u8; HEADER_SIZE], kind: IndexKind) -> Result<[u8; MAGIC_SIZE]> {
    let found: [u8; MAGIC_SIZE] = read_array(buf, 0);
    if &found != kind.magic() {
        return Err(FormatError::InvalidMagic { kind, found });
    }
    Ok(found)
}

#[inline]
fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_chunk_list_header() -> ChunkListHeader {
        let mut header = ChunkListHeader::new();
        header.uuid = [0x5a; UUID_SIZE];
        header.ctime = 1_700_000_000;
        header.index_csum = [0xc3; CSUM_SIZE];
        header.size = 42 * 4 * 1024 * 1024;
        header.chunk_size = 4 * 1024 * 1024;
        header.reserved[0] = 0xff;
        header.reserved[CHUNK_LIST_RESERVED_SIZE - 1] = 0xee;
        header
    }

    #[test]
    fn test_field_offsets() {
        let bytes = sample_chunk_list_header().to_bytes();
        assert_eq!(&bytes[0..8], &CHUNK_LIST_MAGIC);
        assert_eq!(&bytes[8..24], &[0x5au8; 16]);
        assert_eq!(&bytes[24..32], &1_700_000_000i64.to_le_bytes());
        assert_eq!(&bytes[32..64], &[0xc3u8; 32]);
        assert_eq!(&bytes[64..72], &(42u64 * 4 * 1024 * 1024).to_le_bytes());
        assert_eq!(&bytes[72..80], &(4u64 * 1024 * 1024).to_le_bytes());
        assert_eq!(bytes[80], 0xff);
        assert_eq!(bytes[HEADER_SIZE - 1], 0xee);
    }

    #[test]
    fn test_chunk_list_header_roundtrip_bytes() {
        let bytes = sample_chunk_list_header().to_bytes();
        let decoded = ChunkListHeader::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, sample_chunk_list_header());
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_chunk_offset_header_roundtrip_bytes() {
        let mut header = ChunkOffsetHeader::new();
        header.uuid = [1; UUID_SIZE];
        header.ctime = -5;
        header.reserved[17] = 9;
        let bytes = header.to_bytes();
        assert_eq!(bytes[64 + 17], 9);

        let decoded = ChunkOffsetHeader::decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.ctime, -5);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let bytes = ChunkOffsetHeader::new().to_bytes();
        let err = ChunkListHeader::from_bytes(&bytes).unwrap_err();
        match err {
            FormatError::InvalidMagic { kind, found } => {
                assert_eq!(kind, IndexKind::ChunkList);
                assert_eq!(found, CHUNK_OFFSET_MAGIC);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_header_rejected() {
        let bytes = ChunkListHeader::new().to_bytes();
        let err = ChunkListHeader::decode(&mut Cursor::new(&bytes[..100])).unwrap_err();
        assert!(matches!(err, FormatError::ShortHeader { len: 100 }));

        let err = ChunkListHeader::decode(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, FormatError::ShortHeader { len: 0 }));
    }

    #[test]
    fn test_decode_consumes_exactly_one_block() {
        let mut bytes = ChunkListHeader::new().to_bytes().to_vec();
        bytes.extend_from_slice(&[7u8; 10]);
        let mut cursor = Cursor::new(bytes);
        ChunkListHeader::decode(&mut cursor).unwrap();
        assert_eq!(cursor.position(), HEADER_SIZE as u64);
    }
}
