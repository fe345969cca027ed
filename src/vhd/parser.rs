//! Footer and dynamic header decoding
//!
//! Both structures are read field by field in on-disk order through a
//! `Cursor`, converting every integer from big-endian as it is loaded.
//! Checksums are decoded and carried along but never validated.

use std::io::Cursor;

use tracing::debug;
use uuid::Uuid;

use crate::common::binary::{
    read_array, read_u16_be, read_u32_be, read_u64_be, read_u8, utf16_be_to_string,
};

use super::error::{Result, VhdError};
use super::types::*;

/// True if `buf` starts with the footer cookie
pub(crate) fn has_footer_cookie(buf: &[u8]) -> bool {
    buf.len() >= FOOTER_COOKIE.len() && &buf[..FOOTER_COOKIE.len()] == FOOTER_COOKIE
}

/// Decode a 512-byte footer
pub(crate) fn parse_footer(buf: &[u8; FOOTER_SIZE]) -> Result<DiskFooter> {
    if !has_footer_cookie(buf) {
        return Err(VhdError::InvalidHeader);
    }
    let mut r = Cursor::new(&buf[..]);

    let cookie = read_array(&mut r)?;
    let features = read_u32_be(&mut r)?;
    let version = read_u32_be(&mut r)?;
    let data_offset = read_u64_be(&mut r)?;
    let timestamp = read_u32_be(&mut r)?;
    let creator_app = read_array(&mut r)?;
    let creator_version = read_u32_be(&mut r)?;
    let creator_os = read_u32_be(&mut r)?;
    let orig_size = read_u64_be(&mut r)?;
    let cur_size = read_u64_be(&mut r)?;
    let geometry = DiskGeometry {
        cylinders: read_u16_be(&mut r)?,
        heads: read_u8(&mut r)?,
        sectors: read_u8(&mut r)?,
    };
    let raw_type = read_u32_be(&mut r)?;
    let disk_type = DiskType::from_raw(raw_type)
        .ok_or_else(|| VhdError::Unsupported(format!("disk type {}", raw_type)))?;
    let checksum = read_u32_be(&mut r)?;
    let unique_id = Uuid::from_bytes(read_array(&mut r)?);
    let saved_state = read_u8(&mut r)?;

    debug!(
        %disk_type,
        cur_size,
        data_offset,
        version,
        "Parsed VHD footer"
    );

    Ok(DiskFooter {
        cookie,
        features,
        version,
        data_offset,
        timestamp,
        creator_app,
        creator_version,
        creator_os,
        orig_size,
        cur_size,
        geometry,
        disk_type,
        checksum,
        unique_id,
        saved_state,
    })
}

/// Decode a 1024-byte dynamic disk header
pub(crate) fn parse_dynamic_header(buf: &[u8; DYNAMIC_HEADER_SIZE]) -> Result<DynamicHeader> {
    if &buf[..DYNAMIC_COOKIE.len()] != DYNAMIC_COOKIE {
        return Err(VhdError::BadDynamicHeader("cookie is not \"cxsparse\""));
    }
    let mut r = Cursor::new(&buf[..]);

    let cookie = read_array(&mut r)?;
    let data_offset = read_u64_be(&mut r)?;
    let table_offset = read_u64_be(&mut r)?;
    let header_version = read_u32_be(&mut r)?;
    let max_table_entries = read_u32_be(&mut r)?;
    let block_size = read_u32_be(&mut r)?;
    let checksum = read_u32_be(&mut r)?;
    let parent_uuid = Uuid::from_bytes(read_array(&mut r)?);
    let parent_timestamp = read_u32_be(&mut r)?;
    let _reserved = read_u32_be(&mut r)?;
    let name: [u8; 512] = read_array(&mut r)?;
    let parent_name = utf16_be_to_string(&name);

    let mut parent_locators = [ParentLocator {
        code: PlatformCode::None,
        data_space: 0,
        data_length: 0,
        data_offset: 0,
    }; MAX_PARENT_LOCATORS];
    for locator in parent_locators.iter_mut() {
        locator.code = PlatformCode::from_raw(read_u32_be(&mut r)?);
        locator.data_space = read_u32_be(&mut r)?;
        locator.data_length = read_u32_be(&mut r)?;
        let _reserved = read_u32_be(&mut r)?;
        locator.data_offset = read_u64_be(&mut r)?;
    }

    debug!(
        table_offset,
        max_table_entries,
        block_size,
        "Parsed dynamic disk header"
    );

    Ok(DynamicHeader {
        cookie,
        data_offset,
        table_offset,
        header_version,
        max_table_entries,
        block_size,
        checksum,
        parent_uuid,
        parent_timestamp,
        parent_name,
        parent_locators,
    })
}

/// Derive the block geometry from a dynamic header, rejecting layouts the
/// read path cannot address
pub(crate) fn derive_layout(header: &DynamicHeader, cur_size: u64) -> Result<SparseLayout> {
    let block_size = header.block_size;
    if !block_size.is_power_of_two() {
        return Err(VhdError::BadDynamicHeader("block size is not a power of two"));
    }
    if block_size < MIN_BLOCK_SIZE {
        return Err(VhdError::BadDynamicHeader("block size too small"));
    }
    let capacity = header.max_table_entries as u64 * block_size as u64;
    if capacity < cur_size {
        return Err(VhdError::BadDynamicHeader(
            "block allocation table does not cover the disk size",
        ));
    }

    let sectors_per_block = block_size / SECTOR_SIZE as u32;
    let bitmap_size_bytes = sectors_per_block / 8;
    let bitmap_size_sectors = bitmap_size_bytes.div_ceil(SECTOR_SIZE as u32);

    Ok(SparseLayout {
        block_size,
        sectors_per_block,
        sectors_per_block_shift: sectors_per_block.trailing_zeros(),
        bitmap_size_bytes,
        bitmap_size_sectors,
        table_offset: header.table_offset,
        max_table_entries: header.max_table_entries,
        data_region_start: header.table_offset + header.max_table_entries as u64 * 4,
    })
}

/// Collect the parent metadata of a differencing disk
pub(crate) fn parent_info(header: &DynamicHeader) -> ParentInfo {
    ParentInfo {
        uuid: header.parent_uuid,
        timestamp: header.parent_timestamp,
        name: header.parent_name.clone(),
        locators: header
            .parent_locators
            .iter()
            .filter(|l| l.code != PlatformCode::None)
            .copied()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vhd::testutil::*;

    #[test]
    fn test_parse_footer_fields() {
        let raw = footer_bytes(DISK_TYPE_DYNAMIC, 64 * 1024 * 1024, 512);
        let footer = parse_footer(&raw).unwrap();

        assert_eq!(&footer.cookie, b"conectix");
        assert_eq!(footer.features, 2);
        assert_eq!(footer.version, 0x0001_0000);
        assert_eq!(footer.data_offset, 512);
        assert_eq!(&footer.creator_app, b"vpc ");
        assert_eq!(footer.cur_size, 64 * 1024 * 1024);
        assert_eq!(footer.orig_size, 64 * 1024 * 1024);
        assert_eq!(
            footer.geometry,
            DiskGeometry { cylinders: 1024, heads: 16, sectors: 63 }
        );
        assert_eq!(footer.disk_type, DiskType::Dynamic);
        assert_eq!(footer.checksum, 0xDEAD_BEEF);
        assert_eq!(footer.unique_id, Uuid::from_bytes(TEST_UUID));
        assert_eq!(footer.saved_state, 0);
    }

    #[test]
    fn test_parse_footer_rejects_bad_cookie() {
        let mut raw = footer_bytes(DISK_TYPE_FIXED, 4096, u64::MAX);
        raw[0] = b'x';
        assert!(matches!(parse_footer(&raw), Err(VhdError::InvalidHeader)));
    }

    #[test]
    fn test_parse_footer_unknown_disk_type() {
        let raw = footer_bytes(5, 4096, u64::MAX);
        assert!(matches!(parse_footer(&raw), Err(VhdError::Unsupported(_))));
        let raw = footer_bytes(0, 4096, u64::MAX);
        assert!(matches!(parse_footer(&raw), Err(VhdError::Unsupported(_))));
    }

    #[test]
    fn test_parse_dynamic_header() {
        let builder = DynamicImageBuilder::new(0x20_0000, 32).differencing("parent.vhd");
        let header = parse_dynamic_header(&builder.header_bytes()).unwrap();

        assert_eq!(header.data_offset, u64::MAX);
        assert_eq!(header.table_offset, 1536);
        assert_eq!(header.header_version, 0x0001_0000);
        assert_eq!(header.max_table_entries, 32);
        assert_eq!(header.block_size, 0x20_0000);
        assert_eq!(header.checksum, 0xCAFE_F00D);
        assert_eq!(header.parent_uuid, Uuid::from_bytes(PARENT_UUID));
        assert_eq!(header.parent_name, "parent.vhd");

        let parent = parent_info(&header);
        assert_eq!(parent.timestamp, 0x2000_0000);
        assert_eq!(parent.locators.len(), 1);
        assert_eq!(parent.locators[0].code, PlatformCode::W2ku);
        assert_eq!(parent.locators[0].data_length, 20);
        assert_eq!(parent.locators[0].data_offset, 0x10_0000);
    }

    #[test]
    fn test_parse_dynamic_header_bad_cookie() {
        let mut raw = DynamicImageBuilder::new(0x20_0000, 4).header_bytes();
        raw[..8].copy_from_slice(b"cxsparsX");
        assert!(matches!(
            parse_dynamic_header(&raw),
            Err(VhdError::BadDynamicHeader(_))
        ));
    }

    #[test]
    fn test_derive_layout_default_block() {
        let header = parse_dynamic_header(&DynamicImageBuilder::new(0x20_0000, 8).header_bytes()).unwrap();
        let layout = derive_layout(&header, 8 * 0x20_0000).unwrap();

        assert_eq!(layout.sectors_per_block, 4096);
        assert_eq!(layout.sectors_per_block_shift, 12);
        assert_eq!(layout.bitmap_size_bytes, 512);
        assert_eq!(layout.bitmap_size_sectors, 1);
        assert_eq!(layout.data_region_start, 1536 + 8 * 4);
    }

    #[test]
    fn test_derive_layout_small_block_pads_bitmap() {
        let header = parse_dynamic_header(&DynamicImageBuilder::new(64 * 1024, 8).header_bytes()).unwrap();
        let layout = derive_layout(&header, 8 * 64 * 1024).unwrap();

        assert_eq!(layout.sectors_per_block, 128);
        assert_eq!(layout.sectors_per_block_shift, 7);
        assert_eq!(layout.bitmap_size_bytes, 16);
        assert_eq!(layout.bitmap_size_sectors, 1);
    }

    #[test]
    fn test_derive_layout_rejects_bad_geometry() {
        let header = parse_dynamic_header(&DynamicImageBuilder::new(3 * 4096, 8).header_bytes()).unwrap();
        assert!(derive_layout(&header, 4096).is_err());

        let header = parse_dynamic_header(&DynamicImageBuilder::new(2048, 8).header_bytes()).unwrap();
        assert!(derive_layout(&header, 4096).is_err());

        let header = parse_dynamic_header(&DynamicImageBuilder::new(0x20_0000, 2).header_bytes()).unwrap();
        assert!(derive_layout(&header, 2 * 0x20_0000).is_ok());
        assert!(matches!(
            derive_layout(&header, 2 * 0x20_0000 + 512),
            Err(VhdError::BadDynamicHeader(_))
        ));
    }
}
