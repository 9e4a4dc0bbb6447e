mod decoding;
mod encoding;

#[cfg(test)]
mod amf0_tests;

pub(crate) use decoding::Amf0DecoderState;
pub use decoding::{decode_amf0, decode_amf0_values, decode_amf0_with};
pub(crate) use encoding::Amf0EncoderState;
pub use encoding::{encode_amf0, encode_amf0_into, encode_amf0_values, encode_amf0_with};

const NUMBER: u8 = 0x00;
const BOOLEAN: u8 = 0x01;
const STRING: u8 = 0x02;
const OBJECT: u8 = 0x03;
const NULL: u8 = 0x05;
const UNDEFINED: u8 = 0x06;
const REFERENCE: u8 = 0x07;
const ECMA_ARRAY: u8 = 0x08;
const OBJECT_END: u8 = 0x09;
const STRICT_ARRAY: u8 = 0x0A;
const LONG_STRING: u8 = 0x0C;
const TYPED_OBJECT: u8 = 0x10;
const AVMPLUS_OBJECT: u8 = 0x11;
