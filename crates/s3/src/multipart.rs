//! Splitting upload bodies into parts
//!
//! Bodies larger than the configured part size are sent as a sequence of
//! parts, read one at a time from the body. Peak memory per upload is one
//! part.

use tokio::io::{AsyncRead, AsyncReadExt};

use ferry_core::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// Part size used when the config does not set one
pub const DEFAULT_PART_SIZE: u64 = 64 * MIB;

/// Smallest part the store accepts, except for the last one
pub const MIN_PART_SIZE: u64 = 5 * MIB;

/// Largest part the store accepts
pub const MAX_PART_SIZE: u64 = 5 * 1024 * MIB;

/// Most parts one upload may have
pub const MAX_PARTS: u64 = 10_000;

/// How uploads are split into parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Preferred part size in bytes
    pub part_size: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred part size, kept within the store's limits
    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    /// Whether a body of `size` bytes goes through a single PUT
    pub fn is_single_put(&self, size: u64) -> bool {
        size <= self.part_size
    }

    /// Split a body of `size` bytes into parts.
    ///
    /// The preferred part size grows when the body would otherwise need more
    /// than [`MAX_PARTS`] parts.
    pub fn plan(&self, size: u64) -> PartPlan {
        let part_size = self
            .part_size
            .max(size.div_ceil(MAX_PARTS))
            .clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        PartPlan { size, part_size }
    }
}

/// One part of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    /// 1-based, as the store numbers them
    pub number: i32,
    pub len: u64,
}

/// The parts of one upload, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    size: u64,
    part_size: u64,
}

impl PartPlan {
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    pub fn len(&self) -> usize {
        self.size.div_ceil(self.part_size) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn parts(&self) -> impl Iterator<Item = Part> + '_ {
        (0..self.len()).map(move |index| {
            let start = index as u64 * self.part_size;
            Part {
                number: index as i32 + 1,
                len: self.part_size.min(self.size - start),
            }
        })
    }
}

/// Read exactly `len` bytes, failing if the body ends early
pub async fn read_exact_part<R>(reader: &mut R, len: u64, target: &str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(len as usize);
    let read = (&mut *reader).take(len).read_to_end(&mut buf).await?;
    if (read as u64) < len {
        return Err(Error::General(format!(
            "body for {target} ended after {read} of {len} bytes"
        )));
    }
    Ok(buf)
}
