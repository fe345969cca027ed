//! Error type for VHD image access

use thiserror::Error;

/// Result type alias for VHD operations
pub type Result<T> = std::result::Result<T, VhdError>;

/// Errors surfaced by the VHD driver.
///
/// Every variant is fatal for the call that produced it. The only retry in the
/// driver is the second footer location tried by `open`.
#[derive(Debug, Error)]
pub enum VhdError {
    /// Failure reported by the backing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither offset 0 nor the last sector carries a "conectix" footer
    #[error("invalid VHD footer: cookie not found at start or end of file")]
    InvalidHeader,

    #[error("bad dynamic disk header: {0}")]
    BadDynamicHeader(&'static str),

    /// Unknown disk type, or any write attempt
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("read out of range: offset={offset} len={len} size={size}")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    #[error("out of memory allocating VHD buffers")]
    OutOfMemory,

    #[error("corrupt VHD image: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("VHD handle is closed")]
    Closed,
}

impl From<std::collections::TryReserveError> for VhdError {
    fn from(_: std::collections::TryReserveError) -> Self {
        VhdError::OutOfMemory
    }
}
