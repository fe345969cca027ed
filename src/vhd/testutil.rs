//! In-memory VHD image builder for unit tests

use super::types::{BAT_UNALLOCATED, SECTOR_SIZE};

pub(crate) const DISK_TYPE_FIXED: u32 = 2;
pub(crate) const DISK_TYPE_DYNAMIC: u32 = 3;
pub(crate) const DISK_TYPE_DIFFERENCING: u32 = 4;

pub(crate) const TEST_UUID: [u8; 16] = [
    0x6f, 0x2c, 0x1a, 0x44, 0x90, 0x0b, 0x4e, 0x7d, 0xa1, 0x02, 0x33, 0x5e, 0x88, 0x71, 0xc4, 0x09,
];
pub(crate) const PARENT_UUID: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
];

/// Encode a footer the way Virtual PC writes it
pub(crate) fn footer_bytes(disk_type: u32, cur_size: u64, data_offset: u64) -> [u8; 512] {
    let mut f = [0u8; 512];
    f[0..8].copy_from_slice(b"conectix");
    f[8..12].copy_from_slice(&2u32.to_be_bytes());
    f[12..16].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    f[16..24].copy_from_slice(&data_offset.to_be_bytes());
    f[24..28].copy_from_slice(&0x1234_5678u32.to_be_bytes());
    f[28..32].copy_from_slice(b"vpc ");
    f[32..36].copy_from_slice(&0x0005_0003u32.to_be_bytes());
    f[36..40].copy_from_slice(b"Wi2k");
    f[40..48].copy_from_slice(&cur_size.to_be_bytes());
    f[48..56].copy_from_slice(&cur_size.to_be_bytes());
    f[56..58].copy_from_slice(&1024u16.to_be_bytes());
    f[58] = 16;
    f[59] = 63;
    f[60..64].copy_from_slice(&disk_type.to_be_bytes());
    f[64..68].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
    f[68..84].copy_from_slice(&TEST_UUID);
    f
}

/// A fixed image: raw data followed by a footer
pub(crate) fn fixed_image(data: &[u8]) -> Vec<u8> {
    let mut image = data.to_vec();
    image.extend_from_slice(&footer_bytes(DISK_TYPE_FIXED, data.len() as u64, u64::MAX));
    image
}

/// Deterministic, position-dependent fill so misplaced reads are visible
pub(crate) fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32) as u8)
        .collect()
}

struct TestBlock {
    index: u32,
    bitmap: Vec<u8>,
    data: Vec<u8>,
}

pub(crate) struct DynamicImageBuilder {
    disk_type: u32,
    block_size: u32,
    max_table_entries: u32,
    cur_size: u64,
    blocks: Vec<TestBlock>,
    parent_name: Option<String>,
}

impl DynamicImageBuilder {
    pub(crate) fn new(block_size: u32, max_table_entries: u32) -> Self {
        Self {
            disk_type: DISK_TYPE_DYNAMIC,
            block_size,
            max_table_entries,
            cur_size: block_size as u64 * max_table_entries as u64,
            blocks: Vec::new(),
            parent_name: None,
        }
    }

    pub(crate) fn cur_size(mut self, size: u64) -> Self {
        self.cur_size = size;
        self
    }

    pub(crate) fn differencing(mut self, parent_name: &str) -> Self {
        self.disk_type = DISK_TYPE_DIFFERENCING;
        self.parent_name = Some(parent_name.to_string());
        self
    }

    /// Allocate `index` with the given sector bitmap and data (data is
    /// zero-padded to a full block)
    pub(crate) fn block(mut self, index: u32, bitmap: &[u8], data: &[u8]) -> Self {
        let mut full = data.to_vec();
        full.resize(self.block_size as usize, 0);
        self.blocks.push(TestBlock {
            index,
            bitmap: bitmap.to_vec(),
            data: full,
        });
        self
    }

    fn bitmap_sectors(&self) -> u64 {
        let bytes = (self.block_size as u64 / SECTOR_SIZE) / 8;
        bytes.div_ceil(SECTOR_SIZE)
    }

    /// Sector number of the bitmap of the `n`th allocated block
    pub(crate) fn block_sector(&self, n: usize) -> u64 {
        let bat_bytes = (self.max_table_entries as u64 * 4).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        let first = (512 + 1024 + bat_bytes) / SECTOR_SIZE;
        let per_block = self.bitmap_sectors() + self.block_size as u64 / SECTOR_SIZE;
        first + n as u64 * per_block
    }

    pub(crate) fn header_bytes(&self) -> [u8; 1024] {
        let mut h = [0u8; 1024];
        h[0..8].copy_from_slice(b"cxsparse");
        h[8..16].copy_from_slice(&u64::MAX.to_be_bytes());
        h[16..24].copy_from_slice(&(512u64 + 1024).to_be_bytes());
        h[24..28].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        h[28..32].copy_from_slice(&self.max_table_entries.to_be_bytes());
        h[32..36].copy_from_slice(&self.block_size.to_be_bytes());
        h[36..40].copy_from_slice(&0xCAFE_F00Du32.to_be_bytes());
        if let Some(name) = &self.parent_name {
            h[40..56].copy_from_slice(&PARENT_UUID);
            h[56..60].copy_from_slice(&0x2000_0000u32.to_be_bytes());
            for (i, unit) in name.encode_utf16().take(256).enumerate() {
                h[64 + i * 2..66 + i * 2].copy_from_slice(&unit.to_be_bytes());
            }
            // One W2ku locator in the first slot
            h[576..580].copy_from_slice(&0x5732_6B75u32.to_be_bytes());
            h[580..584].copy_from_slice(&512u32.to_be_bytes());
            h[584..588].copy_from_slice(&((name.len() * 2) as u32).to_be_bytes());
            h[592..600].copy_from_slice(&0x10_0000u64.to_be_bytes());
        }
        h
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let footer = footer_bytes(self.disk_type, self.cur_size, 512);
        let mut image = footer.to_vec();
        image.extend_from_slice(&self.header_bytes());

        let mut bat = vec![BAT_UNALLOCATED; self.max_table_entries as usize];
        for (n, block) in self.blocks.iter().enumerate() {
            bat[block.index as usize] = self.block_sector(n) as u32;
        }
        for entry in &bat {
            image.extend_from_slice(&entry.to_be_bytes());
        }
        let aligned = (image.len() as u64).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        image.resize(aligned as usize, 0);

        let bitmap_bytes = (self.bitmap_sectors() * SECTOR_SIZE) as usize;
        for block in &self.blocks {
            let mut bitmap = block.bitmap.clone();
            bitmap.resize(bitmap_bytes, 0);
            image.extend_from_slice(&bitmap);
            image.extend_from_slice(&block.data);
        }

        image.extend_from_slice(&footer);
        image
    }
}
