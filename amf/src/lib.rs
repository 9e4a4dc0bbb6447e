//! Action Message Format codecs.
//!
//! [`amf0`] and [`amf3`] encode and decode the shared [`AmfValue`] model, preserving shared and
//! cyclic arrays and objects through their reference tables. [`remoting`] frames AMF0 values
//! into remoting envelopes.

pub mod amf0;
pub mod amf3;
pub mod buffer;
pub mod cursor;
pub mod error;
pub mod options;
pub mod remoting;
pub mod value;

pub use amf0::{decode_amf0, decode_amf0_values, encode_amf0, encode_amf0_values};
pub use amf3::{decode_amf3, encode_amf3};
pub use buffer::{AppendBuffer, LengthPrefix};
pub use cursor::ReadCursor;
pub use error::{DecodingError, DecodingErrorKind, EncodingError};
pub use options::{CodecOptions, DEFAULT_MAX_DEPTH};
pub use remoting::{Body, Envelope, Header, decode_envelope, encode_envelope};
pub use value::{ALIAS_KEY, AmfObject, AmfValue, Handle};
