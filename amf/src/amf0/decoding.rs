use bytes::Bytes;

use crate::{
    ALIAS_KEY, AmfObject, AmfValue, CodecOptions, DecodingError, DecodingErrorKind, Handle,
    ReadCursor, amf0::*, amf3::Amf3DecoderState, value::MemberSlots,
};

/// Decode a single AMF0 value, returning it together with the number of bytes it occupied.
pub fn decode_amf0(amf_bytes: &[u8]) -> Result<(AmfValue, usize), DecodingError> {
    decode_amf0_with(amf_bytes, &CodecOptions::default())
}

pub fn decode_amf0_with(
    amf_bytes: &[u8],
    options: &CodecOptions,
) -> Result<(AmfValue, usize), DecodingError> {
    let mut cursor = ReadCursor::new(amf_bytes);
    let value = Amf0DecoderState::new(&mut cursor, options.max_depth).decode_value()?;
    Ok((value, cursor.offset()))
}

/// Decode a sequence of AMF0 values written back to back, up to the end of `amf_bytes`.
///
/// All values share one reference table.
pub fn decode_amf0_values(amf_bytes: &[u8]) -> Result<Vec<AmfValue>, DecodingError> {
    let mut cursor = ReadCursor::new(amf_bytes);
    let mut decoder = Amf0DecoderState::new(&mut cursor, CodecOptions::default().max_depth);
    decoder.decode_buf()
}

pub(crate) struct Amf0DecoderState<'a, 'c> {
    cursor: &'c mut ReadCursor<'a>,
    // Per the AMF0 format document (https://rtmp.veriskope.com/pdf/amf0-file-format-specification.pdf),
    // complex types are Object, ECMA Array, Strict Array and Typed Object.
    complexes: Vec<AmfValue>,
    depth: usize,
    max_depth: usize,
}

impl<'a, 'c> Amf0DecoderState<'a, 'c> {
    pub(crate) fn new(cursor: &'c mut ReadCursor<'a>, max_depth: usize) -> Self {
        Self {
            cursor,
            complexes: vec![],
            depth: 0,
            max_depth,
        }
    }

    fn decode_buf(&mut self) -> Result<Vec<AmfValue>, DecodingError> {
        let mut amf_values = vec![];
        while self.cursor.remaining() > 0 {
            amf_values.push(self.decode_value()?);
        }
        Ok(amf_values)
    }

    pub(crate) fn decode_value(&mut self) -> Result<AmfValue, DecodingError> {
        let marker = self.cursor.read_u8()?;

        let amf_value = match marker {
            NUMBER => AmfValue::Number(self.cursor.read_f64()?),
            BOOLEAN => AmfValue::Boolean(self.cursor.read_u8()? == 1),
            STRING => AmfValue::String(self.decode_string()?),
            OBJECT => self.decode_object(None)?,
            NULL => AmfValue::Null,
            UNDEFINED => AmfValue::Undefined,
            REFERENCE => self.decode_reference()?,
            ECMA_ARRAY => {
                // Declared property count, not needed since the pairs are terminated.
                self.cursor.skip(4)?;
                self.decode_object(None)?
            }
            STRICT_ARRAY => self.decode_strict_array()?,
            LONG_STRING => {
                AmfValue::String(Bytes::copy_from_slice(self.cursor.read_prefixed::<u32>()?))
            }
            TYPED_OBJECT => {
                let class_name = self.decode_string()?;
                self.decode_object(Some(class_name))?
            }
            AVMPLUS_OBJECT => {
                Amf3DecoderState::nested(&mut *self.cursor, self.depth, self.max_depth)
                    .decode_value()?
            }
            _ => return Err(self.cursor.fail(DecodingErrorKind::UnknownType(marker))),
        };
        Ok(amf_value)
    }

    fn decode_string(&mut self) -> Result<Bytes, DecodingError> {
        let bytes = self.cursor.read_length_prefixed_bytes()?;
        Ok(Bytes::copy_from_slice(bytes))
    }

    fn decode_reference(&mut self) -> Result<AmfValue, DecodingError> {
        let idx = self.cursor.read_u16()? as usize;
        match self.complexes.get(idx) {
            Some(complex) => Ok(complex.clone()),
            None => Err(self
                .cursor
                .fail(DecodingErrorKind::OutOfBoundsReference(idx))),
        }
    }

    fn decode_strict_array(&mut self) -> Result<AmfValue, DecodingError> {
        let size = self.cursor.read_u32()?;
        if size > i32::MAX as u32 {
            return Err(self.cursor.fail(DecodingErrorKind::CountOverflow(size)));
        }

        self.enter()?;
        let size = size as usize;
        let array = Handle::new(Vec::with_capacity(size.min(self.cursor.remaining())));
        self.complexes.push(AmfValue::Array(array.clone()));

        for _ in 0..size {
            let value = self.decode_value()?;
            array.borrow_mut().push(value);
        }

        self.depth -= 1;
        Ok(AmfValue::Array(array))
    }

    /// Decodes key/value pairs up to the object end marker into a freshly registered object.
    ///
    /// The class name of a typed object ends up under [`ALIAS_KEY`].
    fn decode_object(&mut self, class_name: Option<Bytes>) -> Result<AmfValue, DecodingError> {
        self.enter()?;
        let object = Handle::new(AmfObject::new());
        self.complexes.push(AmfValue::Object(object.clone()));

        let mut slots = MemberSlots::default();
        loop {
            let key = self.cursor.read_length_prefixed_bytes()?;
            if key.is_empty() {
                let marker = self.cursor.read_u8()?;
                if marker != OBJECT_END {
                    return Err(self.cursor.fail(DecodingErrorKind::MissingObjectEnd(marker)));
                }
                break;
            }

            let key = Bytes::copy_from_slice(key);
            let value = self.decode_value()?;
            slots.insert(&object, key, value);
        }

        if let Some(class_name) = class_name {
            let alias = Bytes::from_static(ALIAS_KEY.as_bytes());
            slots.insert(&object, alias, AmfValue::String(class_name));
        }

        self.depth -= 1;
        Ok(AmfValue::Object(object))
    }

    fn enter(&mut self) -> Result<(), DecodingError> {
        if self.depth >= self.max_depth {
            return Err(self
                .cursor
                .fail(DecodingErrorKind::NestingTooDeep(self.max_depth)));
        }
        self.depth += 1;
        Ok(())
    }
}
