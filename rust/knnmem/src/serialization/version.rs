//! Snapshot format versions.

/// Current snapshot version, encoded as `major << 16 | minor`.
pub const CURRENT_VERSION: u32 = SerializationVersion::current().to_u32();

/// A `major.minor` snapshot version.
///
/// Readers accept any file with the same major version and a minor version
/// no newer than their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SerializationVersion {
    pub major: u16,
    pub minor: u16,
}

impl SerializationVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub const fn current() -> Self {
        Self::new(1, 0)
    }

    pub const fn to_u32(self) -> u32 {
        ((self.major as u32) << 16) | (self.minor as u32)
    }

    pub fn from_u32(value: u32) -> Self {
        Self {
            major: (value >> 16) as u16,
            minor: (value & 0xFFFF) as u16,
        }
    }

    /// Whether a reader at `self` can decode a file written at `file`.
    pub fn can_read(self, file: Self) -> bool {
        self.major == file.major && file.minor <= self.minor
    }
}

impl Default for SerializationVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SerializationVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
