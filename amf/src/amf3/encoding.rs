use bytes::{BufMut, Bytes};
use std::collections::HashMap;

use crate::{AmfObject, AmfValue, AppendBuffer, CodecOptions, EncodingError, Handle, amf3::*};

/// Encode a single AMF3 value.
pub fn encode_amf3(value: &AmfValue) -> Result<Bytes, EncodingError> {
    encode_amf3_with(value, &CodecOptions::default())
}

pub fn encode_amf3_with(value: &AmfValue, options: &CodecOptions) -> Result<Bytes, EncodingError> {
    let mut buf = AppendBuffer::new();
    Amf3EncoderState::new(&mut buf, options.max_depth).put_value(value)?;
    Ok(buf.freeze())
}

/// Encode a single AMF3 value into a caller supplied sink.
///
/// The sink only receives complete output, a failed encode leaves it as it was.
pub fn encode_amf3_into<B: BufMut>(
    sink: B,
    value: &AmfValue,
    options: &CodecOptions,
) -> Result<B, EncodingError> {
    let mut buf = AppendBuffer::new();
    Amf3EncoderState::new(&mut buf, options.max_depth).put_value(value)?;
    buf.write_into(sink)
}

pub(crate) struct Amf3EncoderState<'a, B> {
    buf: &'a mut AppendBuffer<B>,
    strings: HashMap<Bytes, usize>,
    // Slot identity -> reference index.
    complexes: HashMap<usize, usize>,
    traits: Vec<Traits>,
    depth: usize,
    max_depth: usize,
}

impl<'a, B> Amf3EncoderState<'a, B>
where
    B: BufMut,
{
    pub(crate) fn new(buf: &'a mut AppendBuffer<B>, max_depth: usize) -> Self {
        Self {
            buf,
            strings: HashMap::new(),
            complexes: HashMap::new(),
            traits: vec![],
            depth: 0,
            max_depth,
        }
    }

    /// Encoder for an AMF3 value embedded at `depth` levels inside an AMF0 walk.
    pub(crate) fn nested(buf: &'a mut AppendBuffer<B>, depth: usize, max_depth: usize) -> Self {
        Self {
            depth,
            ..Self::new(buf, max_depth)
        }
    }

    pub(crate) fn put_value(&mut self, amf3_value: &AmfValue) -> Result<(), EncodingError> {
        match amf3_value {
            AmfValue::Undefined => self.put_marker(UNDEFINED),
            AmfValue::Null => self.put_marker(NULL),
            AmfValue::Boolean(b) => self.put_boolean(*b),
            AmfValue::Number(n) => self.put_number(*n),
            AmfValue::String(s) => self.put_string(s),
            AmfValue::Array(arr) => self.put_array(arr),
            AmfValue::Object(obj) => self.put_object(obj),
        }
    }

    fn put_marker(&mut self, marker: u8) -> Result<(), EncodingError> {
        self.buf.append_u8(marker)
    }

    fn put_boolean(&mut self, b: bool) -> Result<(), EncodingError> {
        match b {
            false => self.put_marker(FALSE),
            true => self.put_marker(TRUE),
        }
    }

    /// Whole numbers in the signed 29-bit range go out as `INTEGER`, the rest as `DOUBLE`.
    fn put_number(&mut self, n: f64) -> Result<(), EncodingError> {
        if n.floor() == n && (I29_MIN..=I29_MAX).contains(&n) {
            self.put_marker(INTEGER)?;
            // Two's complement, truncated to 29 bits by `append_u29`.
            self.buf.append_u29(n as i32 as u32)
        } else {
            self.put_marker(DOUBLE)?;
            self.buf.append_be_f64(n)
        }
    }

    fn put_string(&mut self, s: &Bytes) -> Result<(), EncodingError> {
        self.put_marker(STRING)?;
        self.put_string_raw(s)
    }

    /// Empty strings are always sent inline and never enter the string table.
    fn put_string_raw(&mut self, s: &Bytes) -> Result<(), EncodingError> {
        if s.is_empty() {
            return self.buf.append_u29(U29Ref::Inline(0).to_u29());
        }
        if let Some(&idx) = self.strings.get(s) {
            return self.put_reference(idx);
        }
        if s.len() > U28_MAX as usize {
            return Err(EncodingError::StringTooLong(s.len()));
        }

        self.strings.insert(s.clone(), self.strings.len());
        self.buf.append_u29(U29Ref::Inline(s.len() as u32).to_u29())?;
        self.buf.append(s)
    }

    fn put_reference(&mut self, idx: usize) -> Result<(), EncodingError> {
        if idx > U28_MAX as usize {
            return Err(EncodingError::ReferenceOverflow(idx));
        }
        self.buf.append_u29(U29Ref::Reference(idx as u32).to_u29())
    }

    fn put_array(&mut self, arr: &Handle<Vec<AmfValue>>) -> Result<(), EncodingError> {
        self.put_marker(ARRAY)?;
        if let Some(&idx) = self.complexes.get(&arr.id()) {
            return self.put_reference(idx);
        }

        let dense = arr.borrow();
        if dense.len() > U28_MAX as usize {
            return Err(EncodingError::ArrayTooLong(dense.len()));
        }

        self.remember(arr.id());
        self.enter()?;
        self.buf
            .append_u29(U29Ref::Inline(dense.len() as u32).to_u29())?;
        // No associative part, just its terminating empty key.
        self.buf.append_u29(U29Ref::Inline(0).to_u29())?;
        for val in dense.iter() {
            self.put_value(val)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn put_object(&mut self, obj: &Handle<AmfObject>) -> Result<(), EncodingError> {
        self.put_marker(OBJECT)?;
        if let Some(&idx) = self.complexes.get(&obj.id()) {
            return self.put_reference(idx);
        }

        let object = obj.borrow();
        if object.external {
            return Err(EncodingError::ExternalizableObject);
        }
        if object.len() > MAX_SEALED_COUNT {
            return Err(EncodingError::TooManyMembers(object.len()));
        }

        self.remember(obj.id());
        self.enter()?;
        let traits = Traits {
            class_name: object.class_name.clone().unwrap_or_default(),
            members: object.members.iter().map(|(key, _)| key.clone()).collect(),
            dynamic: object.dynamic,
            external: false,
        };
        self.put_traits(traits)?;

        for (_, value) in object.members.iter() {
            self.put_value(value)?;
        }
        if object.dynamic {
            // Every member was listed in the traits, the dynamic part is empty.
            self.buf.append_u29(U29Ref::Inline(0).to_u29())?;
        }
        self.depth -= 1;
        Ok(())
    }

    /// Writes a traits reference if an identical shape was already sent, the full traits
    /// otherwise.
    fn put_traits(&mut self, traits: Traits) -> Result<(), EncodingError> {
        if let Some(idx) = self.traits.iter().position(|cached| *cached == traits) {
            if idx > MAX_TRAIT_REFERENCE {
                return Err(EncodingError::ReferenceOverflow(idx));
            }
            return self.buf.append_u29(((idx as u32) << 2) | 0b01);
        }

        self.buf.append_u29(traits.header())?;
        self.put_string_raw(&traits.class_name)?;
        for name in traits.members.iter() {
            self.put_string_raw(name)?;
        }
        self.traits.push(traits);
        Ok(())
    }

    fn remember(&mut self, id: usize) {
        let idx = self.complexes.len();
        self.complexes.insert(id, idx);
    }

    fn enter(&mut self) -> Result<(), EncodingError> {
        if self.depth >= self.max_depth {
            return Err(EncodingError::NestingTooDeep(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }
}
