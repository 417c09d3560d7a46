//! .vpt cache file layout

use crate::error::{CacheError, Result};

/// Magic bytes for .vpt files: "ACVP"
pub const MAGIC: [u8; 4] = [0x41, 0x43, 0x56, 0x50];

/// Current format version
pub const VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_LEN: usize = 48;

/// Flag bit 0: payload is zstd-compressed
pub const FLAG_COMPRESSED: u16 = 0x1;

/// Checksum over the stored (possibly compressed) payload
pub const CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// File header (48 bytes fixed size, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    /// Magic bytes: "ACVP"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: compressed)
    pub flags: u16,
    /// Size of the decoded bincode payload
    pub payload_size: u64,
    /// Size of the bytes following the header
    pub stored_size: u64,
    /// CRC64 of the stored bytes
    pub checksum: u64,
    /// Creation time (Unix seconds)
    pub created_at: i64,
    /// Reserved
    pub reserved: u64,
}

impl CacheHeader {
    pub fn new(payload_size: u64, stored_size: u64, checksum: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            payload_size,
            stored_size,
            checksum,
            created_at: chrono::Utc::now().timestamp(),
            reserved: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & FLAG_COMPRESSED) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= FLAG_COMPRESSED;
        } else {
            self.flags &= !FLAG_COMPRESSED;
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.payload_size.to_le_bytes());
        out[16..24].copy_from_slice(&self.stored_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        out[32..40].copy_from_slice(&self.created_at.to_le_bytes());
        out[40..48].copy_from_slice(&self.reserved.to_le_bytes());
        out
    }

    /// Parse and validate magic and version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CacheError::Truncated {
                expected: HEADER_LEN as u64,
                found: bytes.len() as u64,
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(CacheError::InvalidMagic);
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: version,
                expected: VERSION,
            });
        }

        Ok(Self {
            magic,
            version,
            flags: u16::from_le_bytes([bytes[6], bytes[7]]),
            payload_size: read_u64(&bytes[8..16]),
            stored_size: read_u64(&bytes[16..24]),
            checksum: read_u64(&bytes[24..32]),
            created_at: read_u64(&bytes[32..40]) as i64,
            reserved: read_u64(&bytes[40..48]),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
