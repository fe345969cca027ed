//! Type definitions for VHD format parsing

use serde::Serialize;
use uuid::Uuid;

use super::error::{Result, VhdError};

// =============================================================================
// Core Constants
// =============================================================================

pub(crate) const FOOTER_COOKIE: &[u8; 8] = b"conectix";
pub(crate) const DYNAMIC_COOKIE: &[u8; 8] = b"cxsparse";

pub const SECTOR_SIZE: u64 = 512;
pub(crate) const SECTOR_SHIFT: u32 = 9;

pub(crate) const FOOTER_SIZE: usize = 512;
pub(crate) const DYNAMIC_HEADER_SIZE: usize = 1024;
pub(crate) const MAX_PARENT_LOCATORS: usize = 8;

/// BAT value of a block that was never written
pub const BAT_UNALLOCATED: u32 = 0xFFFF_FFFF;

/// Default number of BAT entries held in memory (2 KiB, covers 1 GiB of
/// guest disk at the default block size)
pub const DEFAULT_BAT_WINDOW_ENTRIES: u32 = 512;

/// Smallest block whose sector bitmap still fills at least one byte
pub(crate) const MIN_BLOCK_SIZE: u32 = 4096;

// =============================================================================
// Configuration
// =============================================================================

/// Tunables applied when opening an image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VhdOptions {
    /// Capacity of the BAT window; also the alignment of every window start
    pub bat_window_entries: u32,
}

impl Default for VhdOptions {
    fn default() -> Self {
        Self {
            bat_window_entries: DEFAULT_BAT_WINDOW_ENTRIES,
        }
    }
}

impl VhdOptions {
    pub fn with_bat_window_entries(mut self, entries: u32) -> Self {
        self.bat_window_entries = entries;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.bat_window_entries == 0 {
            return Err(VhdError::InvalidConfig("bat_window_entries must be non-zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Footer
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiskType {
    Fixed,
    Dynamic,
    Differencing,
}

impl DiskType {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            2 => Some(DiskType::Fixed),
            3 => Some(DiskType::Dynamic),
            4 => Some(DiskType::Differencing),
            _ => None,
        }
    }

    /// Dynamic and differencing disks are addressed through the BAT
    pub fn is_sparse(&self) -> bool {
        !matches!(self, DiskType::Fixed)
    }
}

impl std::fmt::Display for DiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskType::Fixed => write!(f, "Fixed"),
            DiskType::Dynamic => write!(f, "Dynamic"),
            DiskType::Differencing => write!(f, "Differencing"),
        }
    }
}

/// CHS geometry as recorded in the footer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiskGeometry {
    pub cylinders: u16,
    pub heads: u8,
    pub sectors: u8,
}

/// The 512-byte footer, decoded to host order
#[derive(Clone, Debug)]
pub struct DiskFooter {
    pub cookie: [u8; 8],
    pub features: u32,
    pub version: u32,
    pub data_offset: u64,
    pub timestamp: u32,
    pub creator_app: [u8; 4],
    pub creator_version: u32,
    pub creator_os: u32,
    pub orig_size: u64,
    pub cur_size: u64,
    pub geometry: DiskGeometry,
    pub disk_type: DiskType,
    pub checksum: u32,
    pub unique_id: Uuid,
    pub saved_state: u8,
}

// =============================================================================
// Dynamic Header
// =============================================================================

/// Platform code of a parent locator entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PlatformCode {
    None,
    /// Deprecated Windows relative path
    Wi2r,
    /// Deprecated Windows absolute path
    Wi2k,
    /// UTF-16 relative Windows path
    W2ru,
    /// UTF-16 absolute Windows path
    W2ku,
    /// Mac OS alias
    Mac,
    /// Mac OS X file URL
    MacX,
    Unknown(u32),
}

impl PlatformCode {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => PlatformCode::None,
            0x5769_3272 => PlatformCode::Wi2r,
            0x5769_326B => PlatformCode::Wi2k,
            0x5732_7275 => PlatformCode::W2ru,
            0x5732_6B75 => PlatformCode::W2ku,
            0x4D16_3220 => PlatformCode::Mac,
            0x4D16_3258 => PlatformCode::MacX,
            other => PlatformCode::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ParentLocator {
    pub code: PlatformCode,
    pub data_space: u32,
    pub data_length: u32,
    pub data_offset: u64,
}

/// The 1024-byte dynamic disk header, decoded to host order
#[derive(Clone, Debug)]
pub struct DynamicHeader {
    pub cookie: [u8; 8],
    pub data_offset: u64,
    pub table_offset: u64,
    pub header_version: u32,
    pub max_table_entries: u32,
    pub block_size: u32,
    pub checksum: u32,
    pub parent_uuid: Uuid,
    pub parent_timestamp: u32,
    pub parent_name: String,
    pub parent_locators: [ParentLocator; MAX_PARENT_LOCATORS],
}

/// What a differencing disk records about its parent. Kept as metadata only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParentInfo {
    pub uuid: Uuid,
    pub timestamp: u32,
    pub name: String,
    /// Locator entries with a non-`None` platform code
    pub locators: Vec<ParentLocator>,
}

// =============================================================================
// Sparse Layout - geometry derived from the dynamic header
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SparseLayout {
    pub block_size: u32,
    pub sectors_per_block: u32,
    /// log2(sectors_per_block)
    pub sectors_per_block_shift: u32,
    pub bitmap_size_bytes: u32,
    /// Bitmap length rounded up to whole sectors
    pub bitmap_size_sectors: u32,
    pub table_offset: u64,
    pub max_table_entries: u32,
    /// First byte after the BAT
    pub data_region_start: u64,
}

// =============================================================================
// Read Results
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// `len` bytes were copied into the caller's buffer
    Ok,
    /// The next `len` bytes hold no data in this image; the buffer is
    /// untouched and the caller decides between zero-fill and a parent image
    BlockFree,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOutcome {
    pub len: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub(crate) fn data(len: usize) -> Self {
        Self { len, status: ReadStatus::Ok }
    }

    pub(crate) fn free(len: usize) -> Self {
        Self { len, status: ReadStatus::BlockFree }
    }
}

// =============================================================================
// Public API Types
// =============================================================================

#[derive(Serialize)]
pub struct VhdInfo {
    pub disk_type: DiskType,
    pub format_version: String,
    pub current_size: u64,
    pub original_size: u64,
    pub sector_count: u64,
    pub geometry: DiskGeometry,
    pub unique_id: String,
    pub creator_app: String,
    pub creator_version: String,
    pub creator_os: String,
    pub timestamp: u32,
    pub saved_state: bool,
    pub footer_checksum: String,
    pub layout: Option<SparseLayout>,
    pub allocated_blocks: Option<u32>,
    pub parent: Option<ParentInfo>,
}
