//! Wire codec primitives.
//!
//! All multi-byte fields are little-endian with fixed widths, pinned here
//! explicitly so frames are byte-identical across platforms. A frame is an
//! append-only buffer with a hard capacity: any write past the cap fails,
//! and the caller must discard the whole frame rather than send a prefix.

use bytes::Bytes;

/// Protocol version, for future compatibility checks.
pub const PROTOCOL_VERSION: u8 = 1;

/// Message discriminator: world tick snapshot.
pub const TAG_TICK: u8 = 0x01;
/// Message discriminator: server chat broadcast.
pub const TAG_CHAT: u8 = 0x02;

/// Hard cap on a single encoded frame.
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

/// Errors from frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A write would exceed the frame capacity. The frame must be discarded.
    #[error("frame capacity exhausted: {needed} bytes needed, {remaining} remaining")]
    Overflow { needed: usize, remaining: usize },

    /// A read ran past the end of the buffer.
    #[error("short read: {needed} bytes needed, {remaining} remaining")]
    ShortRead { needed: usize, remaining: usize },

    /// The message discriminator did not match the expected kind.
    #[error("unexpected message tag {0:#04x}")]
    UnexpectedTag(u8),

    /// A string field held invalid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidString,
}

/// Append-only frame writer with a hard capacity.
#[derive(Debug)]
pub struct FrameWriter {
    buf: Vec<u8>,
    cap: usize,
}

impl FrameWriter {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn reserve(&mut self, needed: usize) -> Result<(), WireError> {
        let remaining = self.cap - self.buf.len();
        if needed > remaining {
            return Err(WireError::Overflow { needed, remaining });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), WireError> {
        self.reserve(1)?;
        self.buf.push(v);
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), WireError> {
        self.reserve(4)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<(), WireError> {
        self.reserve(8)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    pub fn put_f32(&mut self, v: f32) -> Result<(), WireError> {
        self.reserve(4)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Length-prefixed (`u32`) UTF-8 string.
    pub fn put_str(&mut self, s: &str) -> Result<(), WireError> {
        self.reserve(4 + s.len())?;
        self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Freeze the frame into an immutable, cheaply-clonable buffer.
    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Cursor over a received frame.
#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::ShortRead {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn get_f32(&mut self) -> Result<f32, WireError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_str(&mut self) -> Result<String, WireError> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidString)
    }
}
