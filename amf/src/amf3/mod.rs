use bytes::Bytes;

mod decoding;
mod encoding;


pub(crate) use decoding::Amf3DecoderState;
pub use decoding::{decode_amf3, decode_amf3_with};
pub(crate) use encoding::Amf3EncoderState;
pub use encoding::{encode_amf3, encode_amf3_into, encode_amf3_with};

const UNDEFINED: u8 = 0x00;
const NULL: u8 = 0x01;
const FALSE: u8 = 0x02;
const TRUE: u8 = 0x03;
const INTEGER: u8 = 0x04;
const DOUBLE: u8 = 0x05;
const STRING: u8 = 0x06;
const XML_DOC: u8 = 0x07;
const DATE: u8 = 0x08;
const ARRAY: u8 = 0x09;
const OBJECT: u8 = 0x0A;
const XML: u8 = 0x0B;
const BYTE_ARRAY: u8 = 0x0C;

const U28_MAX: u32 = (1 << 28) - 1;

const I29_MAX: f64 = ((1 << 28) - 1) as f64;
const I29_MIN: f64 = -(1 << 28) as f64;

const MAX_SEALED_COUNT: usize = (1 << 25) - 1;
const MAX_TRAIT_REFERENCE: usize = (1 << 27) - 1;

// Flags of the U29O header of an object, section 3.12 of the AMF3 format document
// (https://github.com/q191201771/doc/blob/master/spec-amf-file-format-spec.pdf).
const TRAITS_INLINE_FLAG: u32 = 0b0010;
const EXTERNALIZABLE_FLAG: u32 = 0b0100;
const DYNAMIC_FLAG: u32 = 0b1000;

/// Low bit of the U29 in front of strings, arrays, objects and other complex values.
///
/// A set bit means the value follows inline and the remaining bits are its length, a clear bit
/// means the remaining bits index a reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum U29Ref {
    Reference(u32),
    Inline(u32),
}

impl U29Ref {
    pub(crate) fn from_u29(u29: u32) -> Self {
        match u29 & 0b1 {
            1 => U29Ref::Inline(u29 >> 1),
            _ => U29Ref::Reference(u29 >> 1),
        }
    }

    pub(crate) fn to_u29(self) -> u32 {
        match self {
            U29Ref::Reference(idx) => idx << 1,
            U29Ref::Inline(len) => (len << 1) | 0b1,
        }
    }
}

/// Shape of an AMF3 object, shared between instances through the traits table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Traits {
    // Empty for anonymous objects.
    class_name: Bytes,
    members: Vec<Bytes>,
    dynamic: bool,
    external: bool,
}

impl Traits {
    fn header(&self) -> u32 {
        let mut u29o = ((self.members.len() as u32) << 4) | TRAITS_INLINE_FLAG | 0b1;
        if self.external {
            u29o |= EXTERNALIZABLE_FLAG;
        }
        if self.dynamic {
            u29o |= DYNAMIC_FLAG;
        }
        u29o
    }
}

#[cfg(test)]
mod u29_ref_test {
    use super::U29Ref;

    #[test]
    fn test_discriminator_sense() {
        assert_eq!(U29Ref::Inline(3).to_u29(), 0b111);
        assert_eq!(U29Ref::Reference(3).to_u29(), 0b110);
        assert_eq!(U29Ref::from_u29(0b111), U29Ref::Inline(3));
        assert_eq!(U29Ref::from_u29(0b110), U29Ref::Reference(3));
        assert_eq!(U29Ref::from_u29(0b1), U29Ref::Inline(0));
    }
}
