//! Byte-level helpers shared by the frame parsers and writers.
//!
//! All multi-byte integers on the wire are big-endian. Variable-length
//! fields (alert messages, channel status, auth values) declare their
//! unpadded size and are padded with NULs up to a 4-byte boundary.
//! Fixed-width name fields are space padded.

use crate::error::{Cd11Error, Result};

/// Round `len` up to the next 4-byte boundary.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Sequential reader over a frame body. Underflow is reported as
/// [`Cd11Error::FrameTooShort`] so a truncated body never partially
/// applies.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Cd11Error::FrameTooShort {
                expected: self.pos + n,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a fixed-width string field, trimming trailing pad bytes.
    pub fn fixed_str(&mut self, width: usize) -> Result<String> {
        let bytes = self.take(width)?;
        let trimmed = bytes
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(&bytes[..0], |i| &bytes[..=i]);
        String::from_utf8(trimmed.to_vec()).map_err(|_| Cd11Error::InvalidField {
            field: "string",
            reason: format!("not valid UTF-8: {bytes:?}"),
        })
    }

    /// Read `size` content bytes followed by padding up to a 4-byte
    /// boundary. Returns the unpadded content.
    pub fn padded_bytes(&mut self, size: usize) -> Result<Vec<u8>> {
        let raw = self.take(padded_len(size))?;
        Ok(raw[..size].to_vec())
    }
}

/// Append a fixed-width, space-padded string field.
pub fn put_fixed_str(buf: &mut Vec<u8>, field: &'static str, s: &str, width: usize) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(Cd11Error::FieldTooLong {
            field,
            len: bytes.len(),
            width,
        });
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + (width - bytes.len()), b' ');
    Ok(())
}

/// Append content bytes plus NUL padding up to a 4-byte boundary.
pub fn put_padded_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + (padded_len(bytes.len()) - bytes.len()), 0);
}
