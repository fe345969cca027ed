//! Public API for whole-image VHD operations

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info as log_info};

use crate::common::{
    binary::bytes_to_string, HashAlgorithm, ImageSource, StreamingHasher, BUFFER_SIZE,
};

use super::error::{Result, VhdError};
use super::handle::VhdHandle;
use super::parser::has_footer_cookie;
use super::types::*;

// =============================================================================
// Linear Reads
// =============================================================================

/// Fill `buf` from the linear disk at `offset`, zero-filling every range the
/// image holds no data for. Differencing disks get zeros where the parent
/// would be consulted.
pub fn read_zero_filled<S: ImageSource>(
    handle: &mut VhdHandle<S>,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let mut done = 0usize;
    while done < buf.len() {
        let outcome = handle.read(offset + done as u64, &mut buf[done..])?;
        if outcome.len == 0 {
            return Err(VhdError::Corrupt(format!(
                "read made no progress at offset {}",
                offset + done as u64
            )));
        }
        if outcome.status == ReadStatus::BlockFree {
            buf[done..done + outcome.len].fill(0);
        }
        done += outcome.len;
    }
    Ok(())
}

/// Read whole sectors starting at `sector`. `buf.len()` must be a multiple
/// of the sector size. The tail of a last partial sector past the disk size
/// reads as zeros.
pub fn read_sectors<S: ImageSource>(
    handle: &mut VhdHandle<S>,
    sector: u64,
    buf: &mut [u8],
) -> Result<()> {
    if buf.len() as u64 % SECTOR_SIZE != 0 {
        return Err(VhdError::InvalidConfig("sector read length must be a multiple of 512"));
    }
    let count = buf.len() as u64 / SECTOR_SIZE;
    let in_range = sector
        .checked_add(count)
        .is_some_and(|end| end <= handle.sector_count());
    if !in_range {
        return Err(VhdError::OutOfRange {
            offset: sector.saturating_mul(SECTOR_SIZE),
            len: buf.len(),
            size: handle.size(),
        });
    }

    let offset = sector * SECTOR_SIZE;
    let available = (handle.size() - offset).min(buf.len() as u64) as usize;
    let (data, tail) = buf.split_at_mut(available);
    read_zero_filled(handle, offset, data)?;
    tail.fill(0);
    Ok(())
}

/// Stream the whole linear disk through `sink` in `BUFFER_SIZE` pieces
fn for_each_chunk<S, F>(handle: &mut VhdHandle<S>, mut sink: F) -> Result<u64>
where
    S: ImageSource,
    F: FnMut(&[u8], u64) -> Result<()>,
{
    let total = handle.size();
    let mut buf = vec![0u8; BUFFER_SIZE.min(total as usize)];
    let mut offset = 0u64;
    while offset < total {
        let len = buf.len().min((total - offset) as usize);
        read_zero_filled(handle, offset, &mut buf[..len])?;
        offset += len as u64;
        sink(&buf[..len], offset)?;
    }
    Ok(offset)
}

// =============================================================================
// Info Operations
// =============================================================================

/// Check if a file carries a VHD footer at its start or end
pub fn is_vhd<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "is_vhd: file does not exist");
        return Ok(false);
    }

    let mut file = File::open(path)?;
    let size = file.size()?;
    if size < FOOTER_SIZE as u64 {
        return Ok(false);
    }

    let mut cookie = [0u8; 8];
    file.read_at(0, &mut cookie)?;
    if has_footer_cookie(&cookie) {
        return Ok(true);
    }
    file.read_at(size - FOOTER_SIZE as u64, &mut cookie)?;
    let found = has_footer_cookie(&cookie);
    debug!(?path, found, "is_vhd: checked trailing footer");
    Ok(found)
}

/// Summarise an image
pub fn info<P: AsRef<Path>>(path: P) -> Result<VhdInfo> {
    let mut handle = VhdHandle::open(path)?;
    info_from_handle(&mut handle)
}

pub fn info_from_handle<S: ImageSource>(handle: &mut VhdHandle<S>) -> Result<VhdInfo> {
    let allocated_blocks = match handle.layout().map(|l| l.max_table_entries) {
        Some(entries) => {
            let mut count = 0u32;
            for block in 0..entries {
                if handle.bat_entry(block)? != BAT_UNALLOCATED {
                    count += 1;
                }
            }
            Some(count)
        }
        None => None,
    };

    let footer = handle.footer();
    Ok(VhdInfo {
        disk_type: footer.disk_type,
        format_version: format!("{}.{}", footer.version >> 16, footer.version & 0xFFFF),
        current_size: footer.cur_size,
        original_size: footer.orig_size,
        sector_count: handle.sector_count(),
        geometry: footer.geometry,
        unique_id: footer.unique_id.to_string(),
        creator_app: bytes_to_string(&footer.creator_app).trim_end().to_string(),
        creator_version: format!(
            "{}.{}",
            footer.creator_version >> 16,
            footer.creator_version & 0xFFFF
        ),
        creator_os: bytes_to_string(&footer.creator_os.to_be_bytes()),
        timestamp: footer.timestamp,
        saved_state: footer.saved_state != 0,
        footer_checksum: format!("{:08x}", footer.checksum),
        layout: handle.layout().copied(),
        allocated_blocks,
        parent: handle.parent().cloned(),
    })
}

// =============================================================================
// Extraction
// =============================================================================

/// Write the linear disk to `<output_dir>/<stem>.raw`; returns the path
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(path: P, output_dir: Q) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut handle = VhdHandle::open(path)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let output_path = output_dir.as_ref().join(format!("{}.raw", stem));
    let mut output = File::create(&output_path)?;

    let written = for_each_chunk(&mut handle, |chunk, _| {
        output.write_all(chunk)?;
        Ok(())
    })?;
    output.flush()?;

    log_info!(?output_path, written, "Extracted VHD to raw image");
    Ok(output_path)
}

// =============================================================================
// Verification
// =============================================================================

/// Hash the linear disk contents, returning a hex digest
pub fn verify<P: AsRef<Path>>(path: P, algorithm: &str) -> Result<String> {
    verify_with_progress(path, algorithm, |_current, _total| {})
}

pub fn verify_with_progress<P, F>(path: P, algorithm: &str, mut progress_callback: F) -> Result<String>
where
    P: AsRef<Path>,
    F: FnMut(u64, u64),
{
    let algorithm: HashAlgorithm = algorithm.parse().map_err(VhdError::Unsupported)?;
    let mut handle = VhdHandle::open(path)?;
    let total = handle.size();

    let mut hasher = StreamingHasher::new(algorithm);
    for_each_chunk(&mut handle, |chunk, done| {
        hasher.update(chunk);
        progress_callback(done, total);
        Ok(())
    })?;

    let digest = hasher.finalize();
    debug!(algorithm = algorithm.name(), %digest, "Verified VHD contents");
    Ok(digest)
}
