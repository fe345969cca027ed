// Byte-stream access to the file backing an image
//
// The driver only needs two primitives from its backing store: the total
// length and a positioned exact read. Anything that can seek and read gets
// them for free, which covers `std::fs::File` and in-memory `Cursor`s.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

pub trait ImageSource {
    /// Total length of the backing store in bytes
    fn size(&mut self) -> io::Result<u64>;

    /// Fill `buf` from `offset`; a short read is an `UnexpectedEof` error
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> ImageSource for T {
    fn size(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        trace!(offset, len = buf.len(), "read_at");
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}
