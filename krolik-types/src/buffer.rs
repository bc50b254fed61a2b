//! Growable byte store with independent read and write cursors

use bytes::{Buf, BufMut, BytesMut};

use crate::error::BufferUnderflow;

/// A growable byte buffer with separate read and write cursors.
///
/// All codec reads go through a `Buffer`. Reads past the write cursor fail
/// with [`BufferUnderflow`] without moving the read cursor, which is what
/// lets the frame decoder wait for more bytes instead of corrupting its
/// position on a partial frame. Capacity grows on [`append`](Self::append)
/// only.
#[derive(Debug, Default)]
pub struct Buffer {
    bytes: BytesMut,
    read: usize,
}

impl Buffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            read: 0,
        }
    }

    /// Appends bytes at the write cursor
    pub fn append(&mut self, src: &[u8]) {
        self.bytes.put_slice(src);
    }

    /// Number of readable bytes between the read and write cursors
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.read
    }

    /// Returns whether all appended bytes have been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The readable region as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.read..]
    }

    /// Drops the consumed prefix so the storage does not grow without bound
    pub fn discard_consumed(&mut self) {
        self.bytes.advance(self.read);
        self.read = 0;
    }

    fn peek(&self, offset: usize, n: usize) -> Result<&[u8], BufferUnderflow> {
        let start = self.read + offset;
        if start + n > self.bytes.len() {
            return Err(BufferUnderflow);
        }
        Ok(&self.bytes[start..start + n])
    }

    /// Reads one byte at `offset` past the read cursor without consuming
    pub fn peek_u8(&self, offset: usize) -> Result<u8, BufferUnderflow> {
        Ok(self.peek(offset, 1)?[0])
    }

    /// Reads a big-endian u16 at `offset` without consuming
    pub fn peek_u16(&self, offset: usize) -> Result<u16, BufferUnderflow> {
        let b = self.peek(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Reads a big-endian u32 at `offset` without consuming
    pub fn peek_u32(&self, offset: usize) -> Result<u32, BufferUnderflow> {
        let b = self.peek(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a big-endian u64 at `offset` without consuming
    pub fn peek_u64(&self, offset: usize) -> Result<u64, BufferUnderflow> {
        let b = self.peek(offset, 8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    /// Consumes and returns the next `n` readable bytes
    pub fn consume(&mut self, n: usize) -> Result<&[u8], BufferUnderflow> {
        if self.remaining() < n {
            return Err(BufferUnderflow);
        }
        let start = self.read;
        self.read += n;
        Ok(&self.bytes[start..start + n])
    }

    /// Consumes one byte
    pub fn get_u8(&mut self) -> Result<u8, BufferUnderflow> {
        Ok(self.consume(1)?[0])
    }

    /// Consumes a big-endian u16
    pub fn get_u16(&mut self) -> Result<u16, BufferUnderflow> {
        let b = self.consume(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Consumes a big-endian u32
    pub fn get_u32(&mut self) -> Result<u32, BufferUnderflow> {
        let b = self.consume(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Consumes a big-endian u64
    pub fn get_u64(&mut self) -> Result<u64, BufferUnderflow> {
        let b = self.consume(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    /// Consumes a signed byte
    pub fn get_i8(&mut self) -> Result<i8, BufferUnderflow> {
        Ok(self.get_u8()? as i8)
    }

    /// Consumes a big-endian i16
    pub fn get_i16(&mut self) -> Result<i16, BufferUnderflow> {
        Ok(self.get_u16()? as i16)
    }

    /// Consumes a big-endian i32
    pub fn get_i32(&mut self) -> Result<i32, BufferUnderflow> {
        Ok(self.get_u32()? as i32)
    }

    /// Consumes a big-endian i64
    pub fn get_i64(&mut self) -> Result<i64, BufferUnderflow> {
        Ok(self.get_u64()? as i64)
    }

    /// Consumes a big-endian f32
    pub fn get_f32(&mut self) -> Result<f32, BufferUnderflow> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    /// Consumes a big-endian f64
    pub fn get_f64(&mut self) -> Result<f64, BufferUnderflow> {
        Ok(f64::from_bits(self.get_u64()?))
    }
}

impl From<&[u8]> for Buffer {
    fn from(src: &[u8]) -> Self {
        Self {
            bytes: BytesMut::from(src),
            read: 0,
        }
    }
}
