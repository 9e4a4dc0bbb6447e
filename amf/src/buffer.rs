use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::EncodingError;

pub(crate) const U29_MAX: u32 = (1 << 29) - 1;

/// Width of a big-endian length prefix in front of a byte string.
pub trait LengthPrefix {
    const WIDTH: usize;
    const MAX: usize;

    fn put<B: BufMut>(buf: &mut B, len: usize);
    fn get(buf: &mut &[u8]) -> usize;
}

impl LengthPrefix for u16 {
    const WIDTH: usize = 2;
    const MAX: usize = u16::MAX as usize;

    fn put<B: BufMut>(buf: &mut B, len: usize) {
        buf.put_u16(len as u16);
    }

    fn get(buf: &mut &[u8]) -> usize {
        buf.get_u16() as usize
    }
}

impl LengthPrefix for u32 {
    const WIDTH: usize = 4;
    const MAX: usize = u32::MAX as usize;

    fn put<B: BufMut>(buf: &mut B, len: usize) {
        buf.put_u32(len as u32);
    }

    fn get(buf: &mut &[u8]) -> usize {
        buf.get_u32() as usize
    }
}

/// Output sink of a single encode call.
///
/// Any [`BufMut`] can back the buffer, which is how callers plug in their own allocation
/// strategy: a pooled `BytesMut`, a `Vec<u8>` or a fixed `&mut [u8]` arena. A growable sink
/// grows with amortised doubling, a fixed one reports
/// [`EncodingError::AllocationFailure`] once it runs out of room. All multi-byte writes are
/// big-endian.
pub struct AppendBuffer<B = BytesMut> {
    buf: B,
}

impl AppendBuffer<BytesMut> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Moves the buffered bytes into `sink` with a single write. If the sink cannot take all of
    /// them it is left untouched.
    pub fn write_into<S: BufMut>(self, sink: S) -> Result<S, EncodingError> {
        let mut out = AppendBuffer::from_sink(sink);
        out.append(&self.buf)?;
        Ok(out.into_inner())
    }
}

impl Default for AppendBuffer<BytesMut> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> AppendBuffer<B>
where
    B: BufMut,
{
    pub fn from_sink(buf: B) -> Self {
        Self { buf }
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn ensure(&self, requested: usize) -> Result<(), EncodingError> {
        let available = self.buf.remaining_mut();
        if available < requested {
            return Err(EncodingError::AllocationFailure {
                requested,
                available,
            });
        }
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), EncodingError> {
        self.ensure(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn append_u8(&mut self, value: u8) -> Result<(), EncodingError> {
        self.ensure(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn append_be_u16(&mut self, value: u16) -> Result<(), EncodingError> {
        self.ensure(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    pub fn append_be_u32(&mut self, value: u32) -> Result<(), EncodingError> {
        self.ensure(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    pub fn append_be_f64(&mut self, value: f64) -> Result<(), EncodingError> {
        self.ensure(8)?;
        self.buf.put_f64(value);
        Ok(())
    }

    /// Writes `bytes` preceded by its length. The caller makes sure the length fits `L`.
    pub fn append_prefixed<L: LengthPrefix>(&mut self, bytes: &[u8]) -> Result<(), EncodingError> {
        debug_assert!(bytes.len() <= L::MAX);
        self.ensure(L::WIDTH + bytes.len())?;
        L::put(&mut self.buf, bytes.len());
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Writes the low 29 bits of `value` as an AMF3 variable-length integer.
    ///
    /// The first three bytes carry 7 bits each with `0x80` as the continuation flag, a fourth
    /// byte carries a full 8 bits.
    pub fn append_u29(&mut self, value: u32) -> Result<(), EncodingError> {
        let (bytes, n_bytes) = encode_u29(value & U29_MAX);
        self.append(&bytes[..n_bytes])
    }
}

// https://github.com/q191201771/doc/blob/master/spec-amf-file-format-spec.pdf
// Sections 1.3.1 and 3.6 of the AMF3 format document describe this serialization
fn encode_u29(mut u29: u32) -> ([u8; 4], usize) {
    const ONE_BYTE_MAX: u32 = 2u32.pow(7) - 1;
    const TWO_BYTE_MAX: u32 = 2u32.pow(14) - 1;
    const THREE_BYTE_MAX: u32 = 2u32.pow(21) - 1;

    match u29 {
        n if n <= ONE_BYTE_MAX => ([(u29 & 0x7F) as u8, 0, 0, 0], 1),
        n if n <= TWO_BYTE_MAX => {
            let second = (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            ([first, second, 0, 0], 2)
        }
        n if n <= THREE_BYTE_MAX => {
            let third = (u29 & 0x7F) as u8;
            u29 >>= 7;
            let second = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            ([first, second, third, 0], 3)
        }
        _ => {
            let fourth = (u29 & 0xFF) as u8;
            u29 >>= 8;
            let third = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let second = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            ([first, second, third, fourth], 4)
        }
    }
}

#[cfg(test)]
mod buffer_test {
    use bytes::Bytes;

    use super::AppendBuffer;
    use crate::EncodingError;

    fn u29_bytes(value: u32) -> Bytes {
        let mut buf = AppendBuffer::new();
        buf.append_u29(value).unwrap();
        buf.freeze()
    }

    #[test]
    fn encode_u29_test() {
        let expected = Bytes::from_iter([0b01101001]);
        assert_eq!(u29_bytes(105), expected);

        let expected = Bytes::from_iter([0b10010000, 0b01011001]);
        assert_eq!(u29_bytes(2137), expected);

        let expected = Bytes::from_iter([0b10111101, 0b10010101, 0b00011001]);
        assert_eq!(u29_bytes(1_002_137), expected);

        let expected = Bytes::from_iter([0b10000101, 0b10001100, 0b10011100, 0b11101001]);
        assert_eq!(u29_bytes(21_372_137), expected);
    }

    #[test]
    fn encode_u29_boundaries() {
        let cases = [
            (0, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0x1F_FFFF, 3),
            (0x20_0000, 4),
            (0x1FFF_FFFF, 4),
        ];
        for (value, len) in cases {
            assert_eq!(u29_bytes(value).len(), len, "value {value:#x}");
        }
        assert_eq!(u29_bytes(0x1FFF_FFFF), Bytes::from_iter([0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn encode_u29_masks_high_bits() {
        assert_eq!(u29_bytes(0xE000_0005), u29_bytes(5));
    }

    #[test]
    fn big_endian_writers() {
        let mut buf = AppendBuffer::new();
        buf.append_be_u16(0x0102).unwrap();
        buf.append_be_u32(0x0304_0506).unwrap();
        buf.append_be_f64(42.0).unwrap();
        assert_eq!(
            buf.freeze(),
            Bytes::from_iter([1, 2, 3, 4, 5, 6, 0x40, 0x45, 0, 0, 0, 0, 0, 0])
        );
    }

    #[test]
    fn fixed_sink_reports_allocation_failure() {
        let mut storage = [0u8; 3];
        let mut buf = AppendBuffer::from_sink(&mut storage[..]);
        buf.append_be_u16(0xABCD).unwrap();

        let err = buf.append_be_u16(1).unwrap_err();
        assert_eq!(
            err,
            EncodingError::AllocationFailure {
                requested: 2,
                available: 1
            }
        );
        assert_eq!(storage[..2], [0xAB, 0xCD]);
    }

    #[test]
    fn write_into_is_all_or_nothing() {
        let mut buf = AppendBuffer::new();
        buf.append(b"abcd").unwrap();

        let mut storage = [0u8; 3];
        let err = buf.write_into(&mut storage[..]).unwrap_err();
        assert_eq!(
            err,
            EncodingError::AllocationFailure {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(storage, [0, 0, 0]);

        let mut buf = AppendBuffer::new();
        buf.append(b"abcd").unwrap();
        let mut sink = b"hdr".to_vec();
        buf.write_into(&mut sink).unwrap();
        assert_eq!(sink, b"hdrabcd");
    }
}
