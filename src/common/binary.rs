// Shared binary reading utilities for the VHD parser
//
// Every multi-byte integer in a VHD footer, dynamic header and BAT is stored
// big-endian. These helpers convert on load so the rest of the crate only
// ever sees host-order values.

use std::io::{self, Read};

// =============================================================================
// Slice Decoding
// =============================================================================

/// Byte-swap a run of big-endian u32 values into host order
pub fn be_u32_slice(raw: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        raw.chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])),
    );
}

// =============================================================================
// Stream Decoding (from current position)
// =============================================================================

/// Read a single byte from a reader at its current position
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a fixed-size byte array from a reader at its current position
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read u16 big-endian from a reader at its current position
pub fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read u32 big-endian from a reader at its current position
pub fn read_u32_be<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read u64 big-endian from a reader at its current position
pub fn read_u64_be<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

// =============================================================================
// String Decoding
// =============================================================================

/// Convert bytes to a string, stopping at the first NUL
pub fn bytes_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

/// Decode a NUL-padded UTF-16 big-endian field (parent unicode name)
pub fn utf16_be_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
