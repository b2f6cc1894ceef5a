//! Versioned entity identifiers
//!
//! An entity is an index into the world's metadata table plus the version
//! that slot had when the entity was created. Deleting an entity bumps the
//! slot version, so stale copies stop validating once the index is reused.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Entity handle.
///
/// Format: [32-bit index | 32-bit version]
/// - Index 0 is the null entity
/// - Equality compares both halves, hashing only the index
#[derive(Debug, Copy, Clone, Default)]
pub struct Entity {
    index: u32,
    version: u32,
}

impl Entity {
    pub const NULL: Entity = Entity { index: 0, version: 0 };

    pub(crate) const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == 0
    }

    /// Pack into 64 bits (version in the high half).
    pub fn to_bits(&self) -> u64 {
        ((self.version as u64) << 32) | (self.index as u64)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            version: (bits >> 32) as u32,
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.version == other.version
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.version)
    }
}
