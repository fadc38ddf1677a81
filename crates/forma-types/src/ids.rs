//! Strongly-typed identifiers for simulation entities.
//!
//! Newtype wrappers prevent accidental mixing of mass indices with
//! spring indices or container indices. Ids index slot arenas and stay
//! stable across deletions of other entities.

use serde::{Deserialize, Serialize};

/// Index into the mass arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MassId(pub u32);

/// Index into the spring arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpringId(pub u32);

/// Index into the container list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub u32);

impl MassId {
    /// Returns the raw index as `usize` for array indexing.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SpringId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ContainerId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for MassId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<u32> for SpringId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<u32> for ContainerId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}
