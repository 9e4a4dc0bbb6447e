//! AMF remoting envelope: a version, a list of headers and a list of bodies, each carrying one
//! AMF0 encoded value.
//!
//! Wire layout: `u16 version | u16 header count | header* | u16 body count | body*`, where a
//! header is `name | u8 must-understand | u32 length | value` and a body is
//! `target uri | response uri | u32 length | value`. Names and URIs are AMF0 strings without the
//! type marker. The length field is informational, readers skip it.

use bytes::{BufMut, Bytes};
use tracing::{debug, trace};

use crate::{
    AmfValue, AppendBuffer, CodecOptions, DecodingError, EncodingError, ReadCursor,
    amf0::{Amf0DecoderState, Amf0EncoderState},
};

pub const AMF0_VERSION: u16 = 0;
/// Envelopes of this version carry their arrays and objects as AMF3 behind the AVM+ escape.
pub const AMF3_VERSION: u16 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: Bytes,
    /// If true, the endpoint must abort processing if it does not understand this header.
    pub must_understand: bool,
    pub value: AmfValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub target_uri: Bytes,
    /// Responses target this URI suffixed with `/onResult` or `/onStatus`.
    pub response_uri: Bytes,
    pub value: AmfValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: u16,
    pub headers: Vec<Header>,
    pub bodies: Vec<Body>,
}

impl Envelope {
    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        encode_envelope(self.version, &self.headers, &self.bodies)
    }

    pub fn decode(envelope_bytes: &[u8]) -> Result<Self, DecodingError> {
        decode_envelope(envelope_bytes)
    }
}

pub fn encode_envelope(
    version: u16,
    headers: &[Header],
    bodies: &[Body],
) -> Result<Bytes, EncodingError> {
    encode_envelope_with(version, headers, bodies, &CodecOptions::default())
}

pub fn encode_envelope_with(
    version: u16,
    headers: &[Header],
    bodies: &[Body],
    options: &CodecOptions,
) -> Result<Bytes, EncodingError> {
    let avmplus = version == AMF3_VERSION;
    let mut buf = AppendBuffer::new();

    buf.append_be_u16(version)?;

    put_count(&mut buf, headers.len())?;
    for header in headers {
        put_name(&mut buf, &header.name)?;
        buf.append_u8(header.must_understand.into())?;
        put_payload(&mut buf, &header.value, avmplus, options)?;
    }

    put_count(&mut buf, bodies.len())?;
    for body in bodies {
        put_name(&mut buf, &body.target_uri)?;
        put_name(&mut buf, &body.response_uri)?;
        put_payload(&mut buf, &body.value, avmplus, options)?;
    }

    trace!(
        version,
        headers = headers.len(),
        bodies = bodies.len(),
        len = buf.len(),
        "Encoded remoting envelope."
    );
    Ok(buf.freeze())
}

fn put_count<B: BufMut>(buf: &mut AppendBuffer<B>, count: usize) -> Result<(), EncodingError> {
    if count > u16::MAX as usize {
        return Err(EncodingError::ArrayTooLong(count));
    }
    buf.append_be_u16(count as u16)
}

fn put_name<B: BufMut>(buf: &mut AppendBuffer<B>, name: &[u8]) -> Result<(), EncodingError> {
    if name.len() > u16::MAX as usize {
        return Err(EncodingError::StringTooLong(name.len()));
    }
    buf.append_prefixed::<u16>(name)
}

/// Length-prefixed payload with its own reference table.
fn put_payload<B: BufMut>(
    buf: &mut AppendBuffer<B>,
    value: &AmfValue,
    avmplus: bool,
    options: &CodecOptions,
) -> Result<(), EncodingError> {
    let mut payload = AppendBuffer::new();
    Amf0EncoderState::new(&mut payload, avmplus, options.max_depth).put_value(value)?;

    // 0xFFFFFFFF marks an unknown length.
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    buf.append_be_u32(len)?;
    buf.append(&payload.freeze())
}

pub fn decode_envelope(envelope_bytes: &[u8]) -> Result<Envelope, DecodingError> {
    decode_envelope_with(envelope_bytes, &CodecOptions::default())
}

pub fn decode_envelope_with(
    envelope_bytes: &[u8],
    options: &CodecOptions,
) -> Result<Envelope, DecodingError> {
    let mut cursor = ReadCursor::new(envelope_bytes);

    let version = cursor.read_u16()?;

    let header_count = cursor.read_u16()?;
    let mut headers = Vec::with_capacity(header_count as usize);
    for _ in 0..header_count {
        headers.push(decode_header(&mut cursor, options)?);
    }

    let body_count = cursor.read_u16()?;
    let mut bodies = Vec::with_capacity(body_count as usize);
    for _ in 0..body_count {
        bodies.push(decode_body(&mut cursor, options)?);
    }

    trace!(
        version,
        headers = headers.len(),
        bodies = bodies.len(),
        consumed = cursor.offset(),
        "Decoded remoting envelope."
    );
    Ok(Envelope {
        version,
        headers,
        bodies,
    })
}

fn decode_header(
    cursor: &mut ReadCursor<'_>,
    options: &CodecOptions,
) -> Result<Header, DecodingError> {
    let name = Bytes::copy_from_slice(cursor.read_length_prefixed_bytes()?);
    let must_understand = cursor.read_u8()? != 0;
    if must_understand {
        debug!(name = %String::from_utf8_lossy(&name), "Header must be understood.");
    }
    cursor.skip(4)?;
    let value = decode_payload(cursor, options)?;

    Ok(Header {
        name,
        must_understand,
        value,
    })
}

fn decode_body(cursor: &mut ReadCursor<'_>, options: &CodecOptions) -> Result<Body, DecodingError> {
    let target_uri = Bytes::copy_from_slice(cursor.read_length_prefixed_bytes()?);
    let response_uri = Bytes::copy_from_slice(cursor.read_length_prefixed_bytes()?);
    cursor.skip(4)?;
    let value = decode_payload(cursor, options)?;

    Ok(Body {
        target_uri,
        response_uri,
        value,
    })
}

fn decode_payload(
    cursor: &mut ReadCursor<'_>,
    options: &CodecOptions,
) -> Result<AmfValue, DecodingError> {
    Amf0DecoderState::new(cursor, options.max_depth).decode_value()
}
