//! Per-block sector bitmap
//!
//! Each allocated block starts with a bitmap holding one bit per data sector.
//! The most significant bit of a byte stands for the lowest sector number.

use crate::common::ImageSource;

use super::error::Result;
use super::types::SECTOR_SIZE;

#[inline]
fn bit_is_set(byte: u8, bit: u32) -> bool {
    (byte >> bit) & 1 == 1
}

/// Scratch buffer for the bitmap of the block being read
pub(crate) struct BlockBitmap {
    buf: Vec<u8>,
}

impl BlockBitmap {
    /// Allocate a zeroed bitmap of exactly `size_bytes`
    pub(crate) fn new(size_bytes: u32) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size_bytes as usize)?;
        buf.resize(size_bytes as usize, 0);
        Ok(Self { buf })
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self { buf: bytes.to_vec() }
    }

    /// Read the bitmap of the block whose BAT entry is `bat_sector`
    pub(crate) fn load<S: ImageSource>(&mut self, source: &mut S, bat_sector: u32) -> Result<()> {
        source.read_at(bat_sector as u64 * SECTOR_SIZE, &mut self.buf)?;
        Ok(())
    }

    /// True if `sector` (relative to the block) holds data in this image
    pub(crate) fn sector_has_data(&self, sector: u32) -> bool {
        let byte = self.buf[(sector / 8) as usize];
        bit_is_set(byte, 7 - sector % 8)
    }

    /// Length of the run of sectors sharing the state of `start`, capped at
    /// `max_sectors` (at least 1). Returns the state and the run length.
    pub(crate) fn run_from(&self, start: u32, max_sectors: u32) -> (bool, u32) {
        let has_data = self.sector_has_data(start);
        let mut run = 1;
        while run < max_sectors && self.sector_has_data(start + run) == has_data {
            run += 1;
        }
        (has_data, run)
    }
}
