pub mod common;
pub mod logging;
pub mod vhd;

pub use vhd::{ReadOutcome, ReadStatus, VhdError, VhdHandle, VhdOptions};
