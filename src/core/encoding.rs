//! Little-endian wire encoding helpers shared by transactions, scripts
//! and block headers.

use thiserror::Error;

/// Decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("Length {0} exceeds remaining data")]
    LengthTooLarge(u64),
    #[error("Unknown tag {0:#04x}")]
    UnknownTag(u8),
    #[error("Invalid UTF-8 string")]
    InvalidString,
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Length-prefixed byte string
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// Cursor over an encoded byte slice
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEnd {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        String::from_utf8(self.read_var_bytes()?).map_err(|_| DecodeError::InvalidString)
    }

    /// Read an element count, bounded by the bytes left so a corrupt
    /// count cannot trigger a huge allocation
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let count = self.read_u32()? as u64;
        if count * min_element_size.max(1) as u64 > self.remaining() as u64 {
            return Err(DecodeError::LengthTooLarge(count));
        }
        Ok(count as usize)
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}
