//! Entry comparison policy
//!
//! Mirror uses it to decide whether a destination is already up to date and
//! the Diff Engine to decide whether two same-named entries differ. Each
//! enabled criterion must hold for two entries to be considered equal.

use serde::{Deserialize, Serialize};

use crate::traits::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareSettings {
    /// Sizes must be equal
    pub size: bool,
    /// The destination must not be older than the source
    pub mtime: bool,
    /// Checksums must be equal when both sides report one
    pub checksum: bool,
}

impl CompareSettings {
    /// Size only
    pub const SIZE: Self = Self {
        size: true,
        mtime: false,
        checksum: false,
    };

    /// Size and modification time; the mirror default
    pub const SIZE_AND_MTIME: Self = Self {
        size: true,
        mtime: true,
        checksum: false,
    };

    /// Whether `dst` matches `src` under these settings
    pub fn equal(&self, src: &Entry, dst: &Entry) -> bool {
        if src.is_dir() != dst.is_dir() {
            return false;
        }
        if self.size && src.size != dst.size {
            return false;
        }
        if self.mtime {
            match (src.last_modified, dst.last_modified) {
                (Some(s), Some(d)) if d < s => return false,
                (Some(_), None) => return false,
                _ => {}
            }
        }
        if self.checksum
            && let (Some(a), Some(b)) = (&src.checksum, &dst.checksum)
            && normalize_checksum(a) != normalize_checksum(b)
        {
            return false;
        }
        true
    }
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self::SIZE_AND_MTIME
    }
}

/// ETags are often quoted
fn normalize_checksum(value: &str) -> &str {
    value.trim_matches('"')
}
