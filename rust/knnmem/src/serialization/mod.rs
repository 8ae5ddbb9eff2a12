//! Versioned binary encoding for memory snapshots.
//!
//! Every snapshot starts with a fixed header:
//!
//! | field      | type | notes                                  |
//! |------------|------|----------------------------------------|
//! | magic      | u32  | `0x4B4E_4E4D` ("KNNM")                 |
//! | version    | u32  | `major << 16 \| minor`                 |
//! | store type | u8   | see [`StoreTypeId`]                    |
//! | dimension  | u64  | 0 when no dimension is established     |
//!
//! The store-specific body follows. All integers are little-endian.

mod version;

pub use version::{SerializationVersion, CURRENT_VERSION};

use std::io::{self, Read, Write};
use thiserror::Error;

/// Magic number for memory snapshot files.
pub const MAGIC_NUMBER: u32 = 0x4B4E_4E4D; // "KNNM"

/// Upper bound on speculative preallocation while decoding.
const MAX_PREALLOC: usize = 1 << 20;

/// Errors that can occur while saving or loading a snapshot.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid magic number: expected {expected:#x}, got {got:#x}")]
    InvalidMagicNumber { expected: u32, got: u32 },

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(SerializationVersion),

    #[error("Store type mismatch: expected {expected}, got {got}")]
    StoreTypeMismatch { expected: String, got: String },

    #[error("Data corruption: {0}")]
    DataCorruption(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl SerializationError {
    /// True if the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SerializationError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

pub type SerializationResult<T> = Result<T, SerializationError>;

/// Concrete store recorded in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreTypeId {
    Collection = 1,
    Flat = 2,
}

impl StoreTypeId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(StoreTypeId::Collection),
            2 => Some(StoreTypeId::Flat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTypeId::Collection => "MemoryCollection",
            StoreTypeId::Flat => "FlatMemory",
        }
    }
}

/// Header shared by all snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: SerializationVersion,
    pub store_type: StoreTypeId,
    pub dimension: Option<usize>,
}

impl SnapshotHeader {
    pub fn new(store_type: StoreTypeId, dimension: Option<usize>) -> Self {
        Self {
            version: SerializationVersion::current(),
            store_type,
            dimension,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> SerializationResult<()> {
        write_u32(writer, MAGIC_NUMBER)?;
        write_u32(writer, self.version.to_u32())?;
        write_u8(writer, self.store_type as u8)?;
        write_usize(writer, self.dimension.unwrap_or(0))?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> SerializationResult<Self> {
        let magic = read_u32(reader)?;
        if magic != MAGIC_NUMBER {
            return Err(SerializationError::InvalidMagicNumber {
                expected: MAGIC_NUMBER,
                got: magic,
            });
        }

        let version = SerializationVersion::from_u32(read_u32(reader)?);
        let current = SerializationVersion::current();
        if !current.can_read(version) {
            return Err(SerializationError::UnsupportedVersion(version));
        }
        if version < current {
            tracing::warn!(file = %version, current = %current, "loading snapshot written by an older minor version");
        }

        let raw_type = read_u8(reader)?;
        let store_type = StoreTypeId::from_u8(raw_type).ok_or_else(|| {
            SerializationError::InvalidData(format!("Invalid store type: {raw_type}"))
        })?;

        let dimension = match read_usize(reader)? {
            0 => None,
            dim => Some(dim),
        };

        Ok(Self {
            version,
            store_type,
            dimension,
        })
    }

    /// Fail with `StoreTypeMismatch` unless this snapshot holds `expected`.
    pub fn expect_store_type(&self, expected: StoreTypeId) -> SerializationResult<()> {
        if self.store_type != expected {
            return Err(SerializationError::StoreTypeMismatch {
                expected: expected.as_str().to_string(),
                got: self.store_type.as_str().to_string(),
            });
        }
        Ok(())
    }
}

/// Types that write themselves into a snapshot body.
pub trait Serializable {
    fn save<W: Write>(&self, writer: &mut W) -> SerializationResult<()>;
}

/// Types that read themselves back from a snapshot body.
pub trait Deserializable: Sized {
    fn load<R: Read>(reader: &mut R) -> SerializationResult<Self>;
}

// Helper functions for binary I/O

#[inline]
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

#[inline]
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[inline]
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[inline]
pub fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[inline]
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[inline]
pub fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[inline]
pub fn write_usize<W: Write>(writer: &mut W, value: usize) -> io::Result<()> {
    write_u64(writer, value as u64)
}

#[inline]
pub fn read_usize<R: Read>(reader: &mut R) -> io::Result<usize> {
    let value = read_u64(reader)?;
    usize::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("value {value} does not fit in usize"),
        )
    })
}

#[inline]
pub fn write_f32<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[inline]
pub fn read_f32<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Write a length-prefixed run of f32 values.
pub fn write_f32_slice<W: Write>(writer: &mut W, data: &[f32]) -> io::Result<()> {
    write_usize(writer, data.len())?;
    for &value in data {
        write_f32(writer, value)?;
    }
    Ok(())
}

/// Read a length-prefixed run of f32 values.
pub fn read_f32_vec<R: Read>(reader: &mut R) -> io::Result<Vec<f32>> {
    let len = read_usize(reader)?;
    let mut data = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        data.push(read_f32(reader)?);
    }
    Ok(data)
}
