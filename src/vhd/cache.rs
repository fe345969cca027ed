//! Sliding window over the Block Allocation Table
//!
//! A 2 TiB dynamic disk with 2 MiB blocks has a 4 MiB BAT. Only one aligned
//! window of it is kept in memory; a lookup outside the window replaces it.

use tracing::trace;

use crate::common::binary::be_u32_slice;
use crate::common::ImageSource;

use super::error::{Result, VhdError};

pub struct BatCache {
    /// Window contents in host byte order
    entries: Vec<u32>,
    window_start: u32,
    window_len: u32,
    /// Capacity of the window, also the alignment of `window_start`
    window_size: u32,
    table_offset: u64,
    total_entries: u32,
    loads: u64,
}

impl BatCache {
    /// Create an empty cache; nothing is read until the first lookup or
    /// [`BatCache::load_window`]
    pub(crate) fn new(table_offset: u64, total_entries: u32, window_size: u32) -> Result<Self> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(window_size.min(total_entries) as usize)?;
        Ok(Self {
            entries,
            window_start: 0,
            window_len: 0,
            window_size,
            table_offset,
            total_entries,
            loads: 0,
        })
    }

    /// Look up one BAT entry, reloading the window if it is not cached
    pub(crate) fn get<S: ImageSource>(&mut self, source: &mut S, entry: u32) -> Result<u32> {
        if !self.contains(entry) {
            self.load_window(source, entry)?;
        }
        Ok(self.entries[(entry - self.window_start) as usize])
    }

    fn contains(&self, entry: u32) -> bool {
        entry >= self.window_start && entry - self.window_start < self.window_len
    }

    /// Replace the window with the aligned one holding `entry`. The cache is
    /// left untouched if the table read fails.
    pub(crate) fn load_window<S: ImageSource>(&mut self, source: &mut S, entry: u32) -> Result<()> {
        if entry >= self.total_entries {
            return Err(VhdError::Corrupt(format!(
                "BAT entry {} beyond table of {} entries",
                entry, self.total_entries
            )));
        }
        let start = entry - entry % self.window_size;
        let len = self.window_size.min(self.total_entries - start);

        let mut raw = Vec::new();
        raw.try_reserve_exact(len as usize * 4)?;
        raw.resize(len as usize * 4, 0);
        source.read_at(self.table_offset + start as u64 * 4, &mut raw)?;

        be_u32_slice(&raw, &mut self.entries);
        self.window_start = start;
        self.window_len = len;
        self.loads += 1;

        trace!(start, len, loads = self.loads, "Loaded BAT window");
        Ok(())
    }

    /// (first entry, number of entries) currently cached
    pub fn window(&self) -> (u32, u32) {
        (self.window_start, self.window_len)
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn total_entries(&self) -> u32 {
        self.total_entries
    }

    /// Number of times a window was read from the file
    pub fn loads(&self) -> u64 {
        self.loads
    }
}
