//! VHD (Virtual Hard Disk) - read-only image driver
//!
//! This module exposes the guest-visible contents of fixed, dynamic and
//! differencing VHD images as a linear, byte-addressable disk.
//!
//! ## VHD Format Overview
//!
//! ```text
//! Fixed disk:
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Raw disk data (CurSize bytes)                                │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer "conectix" (512 bytes)                                │
//! └──────────────────────────────────────────────────────────────┘
//!
//! Dynamic / differencing disk:
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Footer copy "conectix" (512 bytes)                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Dynamic header "cxsparse" (1024 bytes)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ BAT: MaxTableEntries x u32 sector offsets (0xFFFFFFFF = free)│
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block: [sector bitmap][BlockSize bytes of data]              │
//! │ Block: ...                                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer "conectix" (512 bytes)                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers on disk are big-endian.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vhd_reader_lib::vhd::{VhdHandle, ReadStatus};
//!
//! let mut handle = VhdHandle::open("/path/to/disk.vhd")?;
//! let mut sector = [0u8; 512];
//! let outcome = handle.read(0, &mut sector)?;
//! if outcome.status == ReadStatus::BlockFree {
//!     sector[..outcome.len].fill(0);
//! }
//! ```

mod bitmap;
mod cache;
mod error;
mod handle;
mod operations;
mod parser;
mod types;

#[cfg(test)]
mod testutil;

pub use cache::BatCache;
pub use error::{Result, VhdError};
pub use handle::VhdHandle;
pub use types::{
    DiskFooter, DiskGeometry, DiskType, DynamicHeader, ParentInfo, ParentLocator, PlatformCode,
    ReadOutcome, ReadStatus, SparseLayout, VhdInfo, VhdOptions, BAT_UNALLOCATED,
    DEFAULT_BAT_WINDOW_ENTRIES, SECTOR_SIZE,
};

pub use operations::{
    extract, info, info_from_handle, is_vhd, read_sectors, read_zero_filled, verify,
    verify_with_progress,
};
