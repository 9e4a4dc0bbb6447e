use bytes::Buf;

use crate::{DecodingError, DecodingErrorKind, buffer::LengthPrefix};

/// Bounds-checked forward reader over borrowed input.
///
/// The first failure is stored and returned again by every later call, so a decoder can never
/// make progress past an error.
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    total: usize,
    error: Option<DecodingError>,
}

impl<'a> ReadCursor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            buf: input,
            total: input.len(),
            error: None,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.total - self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn error(&self) -> Option<&DecodingError> {
        self.error.as_ref()
    }

    /// Records `kind` as the sticky error unless an earlier one is already set.
    pub fn fail(&mut self, kind: DecodingErrorKind) -> DecodingError {
        let offset = self.offset();
        self.error
            .get_or_insert(DecodingError { kind, offset })
            .clone()
    }

    fn check(&self) -> Result<(), DecodingError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn need(&mut self, len: usize) -> Result<(), DecodingError> {
        self.check()?;
        if self.buf.len() < len {
            return Err(self.fail(DecodingErrorKind::EndOfInput));
        }
        Ok(())
    }

    /// Advances past `len` bytes. Only valid after a successful [`ReadCursor::need`].
    pub fn consume(&mut self, len: usize) {
        debug_assert!(self.error.is_none() && len <= self.buf.len());
        self.buf.advance(len);
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodingError> {
        self.need(len)?;
        self.consume(len);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodingError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodingError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodingError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodingError> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodingError> {
        self.need(len)?;
        let (bytes, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(bytes)
    }

    /// Reads a big-endian length of width `L` followed by that many bytes.
    pub fn read_prefixed<L: LengthPrefix>(&mut self) -> Result<&'a [u8], DecodingError> {
        self.need(L::WIDTH)?;
        let len = L::get(&mut self.buf);
        self.read_bytes(len)
    }

    /// AMF0 string form: 16-bit length, then the bytes.
    pub fn read_length_prefixed_bytes(&mut self) -> Result<&'a [u8], DecodingError> {
        self.read_prefixed::<u16>()
    }

    // https://github.com/q191201771/doc/blob/master/spec-amf-file-format-spec.pdf
    // Sections 1.3.1 and 3.6 of the AMF3 format document describe this serialization
    pub fn read_u29(&mut self) -> Result<u32, DecodingError> {
        let mut result: u32 = 0;

        for bytes_used in 1..=4 {
            let byte = self.read_u8()?;
            if bytes_used == 4 {
                result = (result << 8) | byte as u32;
                break;
            }

            result = (result << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                break;
            }
        }

        Ok(result)
    }

    /// U29 reinterpreted as a 29-bit two's complement integer.
    pub fn read_i29(&mut self) -> Result<i32, DecodingError> {
        let u29 = self.read_u29()?;
        Ok(((u29 << 3) as i32) >> 3)
    }
}
