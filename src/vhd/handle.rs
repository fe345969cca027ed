//! VhdHandle - main interface for VHD image access

use std::fs::File;
use std::path::Path;

use tracing::{debug, trace};

use crate::common::ImageSource;

use super::bitmap::BlockBitmap;
use super::cache::BatCache;
use super::error::{Result, VhdError};
use super::parser::{derive_layout, has_footer_cookie, parse_dynamic_header, parse_footer, parent_info};
use super::types::*;

/// Block lookup state for dynamic and differencing disks
struct SparseState {
    layout: SparseLayout,
    bat: BatCache,
    bitmap: BlockBitmap,
}

// =============================================================================
// VHD Handle - Main Interface
// =============================================================================

/// An open, read-only VHD image.
///
/// All lookup state (the BAT window and the bitmap scratch buffer) belongs to
/// the handle; reads take `&mut self`.
pub struct VhdHandle<S = File> {
    /// Backing file; `None` once closed
    source: Option<S>,
    footer: DiskFooter,
    sparse: Option<SparseState>,
    parent: Option<ParentInfo>,
}

impl VhdHandle<File> {
    /// Open a VHD file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, VhdOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: VhdOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "Opening VHD image");
        let file = File::open(path)?;
        Self::from_source(file, options)
    }
}

impl<S: ImageSource> VhdHandle<S> {
    /// Open an image from any seekable byte source
    pub fn from_source(mut source: S, options: VhdOptions) -> Result<Self> {
        options.validate()?;

        let file_size = source.size()?;
        let footer = Self::locate_footer(&mut source, file_size)?;

        let (sparse, parent) = if footer.disk_type.is_sparse() {
            let mut raw = [0u8; DYNAMIC_HEADER_SIZE];
            source.read_at(footer.data_offset, &mut raw)?;
            let header = parse_dynamic_header(&raw)?;
            let layout = derive_layout(&header, footer.cur_size)?;

            let bitmap = BlockBitmap::new(layout.bitmap_size_bytes)?;
            let mut bat = BatCache::new(
                layout.table_offset,
                layout.max_table_entries,
                options.bat_window_entries,
            )?;
            if layout.max_table_entries > 0 {
                bat.load_window(&mut source, 0)?;
            }

            let parent = match footer.disk_type {
                DiskType::Differencing => Some(parent_info(&header)),
                _ => None,
            };
            debug!(
                block_size = layout.block_size,
                entries = layout.max_table_entries,
                window = options.bat_window_entries,
                "Sparse layout ready"
            );
            (Some(SparseState { layout, bat, bitmap }), parent)
        } else {
            (None, None)
        };

        Ok(Self {
            source: Some(source),
            footer,
            sparse,
            parent,
        })
    }

    /// Find the footer: the copy at offset 0 first, then the last sector
    /// (boot-time file layers are unreliable at reading the trailing one).
    fn locate_footer(source: &mut S, file_size: u64) -> Result<DiskFooter> {
        if file_size < FOOTER_SIZE as u64 {
            return Err(VhdError::InvalidHeader);
        }
        let mut raw = [0u8; FOOTER_SIZE];

        source.read_at(0, &mut raw)?;
        if has_footer_cookie(&raw) {
            debug!("Footer copy found at offset 0");
            return parse_footer(&raw);
        }

        let tail = file_size - FOOTER_SIZE as u64;
        debug!(tail, "No footer at offset 0, trying end of file");
        source.read_at(tail, &mut raw)?;
        parse_footer(&raw)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read from the linear disk at `offset` into `buf`.
    ///
    /// Returns how many bytes the call covered and whether they were copied
    /// (`ReadStatus::Ok`) or are absent from this image
    /// (`ReadStatus::BlockFree`). A sparse read never crosses a block, nor a
    /// change between present and absent sectors, so the returned length can
    /// be shorter than `buf`.
    pub fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<ReadOutcome> {
        let size = self.footer.cur_size;
        let in_range = offset
            .checked_add(buf.len() as u64)
            .is_some_and(|end| end <= size);
        if !in_range {
            return Err(VhdError::OutOfRange { offset, len: buf.len(), size });
        }
        let source = self.source.as_mut().ok_or(VhdError::Closed)?;
        if buf.is_empty() {
            return Ok(ReadOutcome::data(0));
        }

        let Some(sparse) = self.sparse.as_mut() else {
            source.read_at(offset, buf)?;
            return Ok(ReadOutcome::data(buf.len()));
        };
        let layout = &sparse.layout;

        let block_index = (offset >> (SECTOR_SHIFT + layout.sectors_per_block_shift)) as u32;
        let sector_in_block = ((offset >> SECTOR_SHIFT) % layout.sectors_per_block as u64) as u32;
        let byte_in_sector = (offset % SECTOR_SIZE) as usize;

        // Everything up to the end of the current block
        let block_remaining = (layout.sectors_per_block - sector_in_block) as usize
            * SECTOR_SIZE as usize
            - byte_in_sector;
        let len = buf.len().min(block_remaining);

        let bat_value = sparse.bat.get(source, block_index)?;
        if bat_value == BAT_UNALLOCATED {
            trace!(offset, block_index, len, "Block not allocated");
            return Ok(ReadOutcome::free(len));
        }

        sparse.bitmap.load(source, bat_value)?;
        let touched_sectors = (byte_in_sector + len).div_ceil(SECTOR_SIZE as usize) as u32;
        let (has_data, run_sectors) = sparse.bitmap.run_from(sector_in_block, touched_sectors);
        let run_len = (run_sectors as usize * SECTOR_SIZE as usize - byte_in_sector).min(len);

        trace!(
            offset,
            block_index,
            bat_value,
            sector_in_block,
            run_sectors,
            has_data,
            "Sparse read"
        );

        if !has_data {
            return Ok(ReadOutcome::free(run_len));
        }

        let data_start = (bat_value as u64
            + layout.bitmap_size_sectors as u64
            + sector_in_block as u64)
            * SECTOR_SIZE
            + byte_in_sector as u64;
        source.read_at(data_start, &mut buf[..run_len])?;
        Ok(ReadOutcome::data(run_len))
    }

    /// Writing is not supported for any disk type
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        Err(VhdError::Unsupported(format!(
            "write of {} bytes at offset {}: VHD images are read-only",
            data.len(),
            offset
        )))
    }

    /// Release the file and buffers. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!("Closing VHD image");
        }
        self.sparse = None;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Virtual disk size in bytes (the footer's current size)
    pub fn size(&self) -> u64 {
        self.footer.cur_size
    }

    /// Number of 512-byte sectors needed to cover the disk
    pub fn sector_count(&self) -> u64 {
        self.footer.cur_size.div_ceil(SECTOR_SIZE)
    }

    pub fn footer(&self) -> &DiskFooter {
        &self.footer
    }

    pub fn disk_type(&self) -> DiskType {
        self.footer.disk_type
    }

    /// Block geometry; `None` for fixed disks or once closed
    pub fn layout(&self) -> Option<&SparseLayout> {
        self.sparse.as_ref().map(|s| &s.layout)
    }

    /// Parent metadata of a differencing disk
    pub fn parent(&self) -> Option<&ParentInfo> {
        self.parent.as_ref()
    }

    pub fn bat_cache(&self) -> Option<&BatCache> {
        self.sparse.as_ref().map(|s| &s.bat)
    }

    /// Look up the raw BAT entry of `block`
    pub fn bat_entry(&mut self, block: u32) -> Result<u32> {
        let source = self.source.as_mut().ok_or(VhdError::Closed)?;
        let sparse = self
            .sparse
            .as_mut()
            .ok_or_else(|| VhdError::Unsupported("fixed disks have no BAT".to_string()))?;
        sparse.bat.get(source, block)
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }
}
