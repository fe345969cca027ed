// Common utilities shared by the VHD driver

pub mod binary;
pub mod hash;
pub mod source;

// Re-exports for convenience
pub use hash::{compute_hash, HashAlgorithm, StreamingHasher};
pub use source::ImageSource;

// Shared constants
pub const BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB buffer for extract/verify throughput
