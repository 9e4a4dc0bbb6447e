use bytes::Bytes;

use crate::{
    AmfObject, AmfValue, CodecOptions, DecodingError, DecodingErrorKind, Handle, ReadCursor,
    amf3::*, value::MemberSlots,
};

/// Decode a single AMF3 value, returning it together with the number of bytes it occupied.
pub fn decode_amf3(amf_bytes: &[u8]) -> Result<(AmfValue, usize), DecodingError> {
    decode_amf3_with(amf_bytes, &CodecOptions::default())
}

pub fn decode_amf3_with(
    amf_bytes: &[u8],
    options: &CodecOptions,
) -> Result<(AmfValue, usize), DecodingError> {
    let mut cursor = ReadCursor::new(amf_bytes);
    let value = Amf3DecoderState::new(&mut cursor, options.max_depth).decode_value()?;
    Ok((value, cursor.offset()))
}

pub(crate) struct Amf3DecoderState<'a, 'c> {
    cursor: &'c mut ReadCursor<'a>,
    strings: Vec<Bytes>,
    traits: Vec<Traits>,
    complexes: Vec<AmfValue>,
    depth: usize,
    max_depth: usize,
}

impl<'a, 'c> Amf3DecoderState<'a, 'c> {
    pub(crate) fn new(cursor: &'c mut ReadCursor<'a>, max_depth: usize) -> Self {
        Self {
            cursor,
            strings: vec![],
            traits: vec![],
            complexes: vec![],
            depth: 0,
            max_depth,
        }
    }

    /// Decoder for an AMF3 value embedded at `depth` levels inside an AMF0 walk.
    pub(crate) fn nested(cursor: &'c mut ReadCursor<'a>, depth: usize, max_depth: usize) -> Self {
        Self {
            depth,
            ..Self::new(cursor, max_depth)
        }
    }

    pub(crate) fn decode_value(&mut self) -> Result<AmfValue, DecodingError> {
        let marker = self.cursor.read_u8()?;

        match marker {
            UNDEFINED => Ok(AmfValue::Undefined),
            NULL => Ok(AmfValue::Null),
            FALSE => Ok(AmfValue::Boolean(false)),
            TRUE => Ok(AmfValue::Boolean(true)),
            INTEGER => Ok(AmfValue::Number(self.cursor.read_i29()? as f64)),
            DOUBLE => Ok(AmfValue::Number(self.cursor.read_f64()?)),
            STRING => Ok(AmfValue::String(self.decode_string_raw()?)),
            XML_DOC | XML | BYTE_ARRAY => self.decode_byte_complex(),
            DATE => self.decode_date(),
            ARRAY => self.decode_array(),
            OBJECT => self.decode_object(),
            _ => Err(self.cursor.fail(DecodingErrorKind::UnknownType(marker))),
        }
    }

    /// XML, XML document and byte array payloads, all kept as raw bytes.
    fn decode_byte_complex(&mut self) -> Result<AmfValue, DecodingError> {
        let decode = |decoder: &mut Self, size: usize| {
            let bytes = decoder.cursor.read_bytes(size)?;
            let amf_value = AmfValue::String(Bytes::copy_from_slice(bytes));
            decoder.complexes.push(amf_value.clone());
            Ok(amf_value)
        };

        self.decode_complex(decode)
    }

    /// Dates carry milliseconds since the epoch, decoded as a plain number.
    fn decode_date(&mut self) -> Result<AmfValue, DecodingError> {
        let decode = |decoder: &mut Self, _| {
            let amf_value = AmfValue::Number(decoder.cursor.read_f64()?);
            decoder.complexes.push(amf_value.clone());
            Ok(amf_value)
        };

        self.decode_complex(decode)
    }

    fn decode_array(&mut self) -> Result<AmfValue, DecodingError> {
        let decode = |decoder: &mut Self, size: usize| {
            if !decoder.decode_string_raw()?.is_empty() {
                return Err(decoder.cursor.fail(DecodingErrorKind::AssociativeArray));
            }

            decoder.enter()?;
            let array = Handle::new(Vec::with_capacity(size.min(decoder.cursor.remaining())));
            decoder.complexes.push(AmfValue::Array(array.clone()));

            for _ in 0..size {
                let value = decoder.decode_value()?;
                array.borrow_mut().push(value);
            }

            decoder.depth -= 1;
            Ok(AmfValue::Array(array))
        };

        self.decode_complex(decode)
    }

    fn decode_object(&mut self) -> Result<AmfValue, DecodingError> {
        let u29o = self.cursor.read_u29()?;
        if let U29Ref::Reference(idx) = U29Ref::from_u29(u29o) {
            return self.decode_reference(idx as usize);
        }

        let amf_trait = self.decode_object_trait(u29o)?;

        self.enter()?;
        let class_name = match amf_trait.class_name.is_empty() {
            true => None,
            false => Some(amf_trait.class_name.clone()),
        };
        let object = Handle::new(AmfObject {
            class_name,
            members: Vec::new(),
            dynamic: amf_trait.dynamic,
            external: false,
        });
        self.complexes.push(AmfValue::Object(object.clone()));

        let mut slots = MemberSlots::default();
        for key in amf_trait.members {
            let value = self.decode_value()?;
            slots.insert(&object, key, value);
        }

        if amf_trait.dynamic {
            loop {
                let key = self.decode_string_raw()?;
                if key.is_empty() {
                    break;
                }
                let value = self.decode_value()?;
                slots.insert(&object, key, value);
            }
        }

        self.depth -= 1;
        Ok(AmfValue::Object(object))
    }

    fn decode_object_trait(&mut self, u29o: u32) -> Result<Traits, DecodingError> {
        if u29o & TRAITS_INLINE_FLAG == 0 {
            let trait_idx = (u29o >> 2) as usize;
            return match self.traits.get(trait_idx) {
                Some(amf_trait) => Ok(amf_trait.clone()),
                None => Err(self
                    .cursor
                    .fail(DecodingErrorKind::OutOfBoundsReference(trait_idx))),
            };
        }
        if u29o & EXTERNALIZABLE_FLAG != 0 {
            return Err(self.cursor.fail(DecodingErrorKind::ExternalizableTrait));
        }

        let dynamic = u29o & DYNAMIC_FLAG != 0;
        let sealed_members = (u29o >> 4) as usize;

        let class_name = self.decode_string_raw()?;
        // Not preallocated, the count comes straight from the input.
        let mut members = Vec::new();
        for _ in 0..sealed_members {
            members.push(self.decode_string_raw()?);
        }

        let amf_trait = Traits {
            class_name,
            members,
            dynamic,
            external: false,
        };
        self.traits.push(amf_trait.clone());
        Ok(amf_trait)
    }

    /// Reads the reference-or-inline U29 and either resolves the reference or hands the inline
    /// length to `decode`.
    fn decode_complex<F>(&mut self, decode: F) -> Result<AmfValue, DecodingError>
    where
        F: FnOnce(&mut Self, usize) -> Result<AmfValue, DecodingError>,
    {
        let u29 = self.cursor.read_u29()?;
        match U29Ref::from_u29(u29) {
            U29Ref::Inline(size) => decode(self, size as usize),
            U29Ref::Reference(idx) => self.decode_reference(idx as usize),
        }
    }

    fn decode_reference(&mut self, idx: usize) -> Result<AmfValue, DecodingError> {
        match self.complexes.get(idx) {
            Some(complex) => Ok(complex.clone()),
            None => Err(self
                .cursor
                .fail(DecodingErrorKind::OutOfBoundsReference(idx))),
        }
    }

    fn decode_string_raw(&mut self) -> Result<Bytes, DecodingError> {
        let u29 = self.cursor.read_u29()?;

        match U29Ref::from_u29(u29) {
            U29Ref::Inline(0) => Ok(Bytes::new()),
            U29Ref::Inline(size) => {
                let string = Bytes::copy_from_slice(self.cursor.read_bytes(size as usize)?);
                self.strings.push(string.clone());
                Ok(string)
            }
            U29Ref::Reference(idx) => {
                let idx = idx as usize;
                match self.strings.get(idx) {
                    Some(string) => Ok(string.clone()),
                    None => Err(self
                        .cursor
                        .fail(DecodingErrorKind::OutOfBoundsReference(idx))),
                }
            }
        }
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
