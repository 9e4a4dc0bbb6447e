use bytes::{BufMut, Bytes};
use std::collections::HashMap;
use tracing::warn;

use crate::{
    ALIAS_KEY, AmfObject, AmfValue, AppendBuffer, CodecOptions, EncodingError, Handle, amf0::*,
    amf3::Amf3EncoderState,
};

/// Encode a single AMF0 value.
///
/// With `avmplus` set every array and object is written as an AVM+ escape followed by its AMF3
/// encoding, scalars stay AMF0.
pub fn encode_amf0(value: &AmfValue, avmplus: bool) -> Result<Bytes, EncodingError> {
    encode_amf0_with(value, avmplus, &CodecOptions::default())
}

pub fn encode_amf0_with(
    value: &AmfValue,
    avmplus: bool,
    options: &CodecOptions,
) -> Result<Bytes, EncodingError> {
    let mut buf = AppendBuffer::new();
    Amf0EncoderState::new(&mut buf, avmplus, options.max_depth).put_value(value)?;
    Ok(buf.freeze())
}

/// Encode a single AMF0 value into a caller supplied sink.
///
/// The sink only receives complete output, a failed encode leaves it as it was.
pub fn encode_amf0_into<B: BufMut>(
    sink: B,
    value: &AmfValue,
    avmplus: bool,
    options: &CodecOptions,
) -> Result<B, EncodingError> {
    let mut buf = AppendBuffer::new();
    Amf0EncoderState::new(&mut buf, avmplus, options.max_depth).put_value(value)?;
    buf.write_into(sink)
}

/// Encode a sequence of AMF0 values written back to back.
///
/// All values share one reference table.
pub fn encode_amf0_values(amf_values: &[AmfValue]) -> Result<Bytes, EncodingError> {
    let mut buf = AppendBuffer::new();
    let mut encoder = Amf0EncoderState::new(&mut buf, false, CodecOptions::default().max_depth);
    for value in amf_values {
        encoder.put_value(value)?;
    }
    Ok(buf.freeze())
}

pub(crate) struct Amf0EncoderState<'a, B> {
    buf: &'a mut AppendBuffer<B>,
    avmplus: bool,
    // Slot identity -> reference index, in first-encounter order.
    complexes: HashMap<usize, usize>,
    depth: usize,
    max_depth: usize,
}

impl<'a, B> Amf0EncoderState<'a, B>
where
    B: BufMut,
{
    pub(crate) fn new(buf: &'a mut AppendBuffer<B>, avmplus: bool, max_depth: usize) -> Self {
        Self {
            buf,
            avmplus,
            complexes: HashMap::new(),
            depth: 0,
            max_depth,
        }
    }

    pub(crate) fn put_value(&mut self, value: &AmfValue) -> Result<(), EncodingError> {
        match value {
            AmfValue::Undefined => self.buf.append_u8(UNDEFINED),
            AmfValue::Null => self.buf.append_u8(NULL),
            AmfValue::Boolean(b) => self.put_bool(*b),
            AmfValue::Number(n) => self.put_number(*n),
            AmfValue::String(s) => self.put_string(s),
            AmfValue::Array(_) | AmfValue::Object(_) if self.avmplus => {
                self.put_avmplus_object(value)
            }
            AmfValue::Array(arr) => self.put_strict_array(arr),
            AmfValue::Object(obj) => self.put_object(obj),
        }
    }

    fn put_number(&mut self, n: f64) -> Result<(), EncodingError> {
        self.buf.append_u8(NUMBER)?;
        self.buf.append_be_f64(n)
    }

    fn put_bool(&mut self, b: bool) -> Result<(), EncodingError> {
        self.buf.append_u8(BOOLEAN)?;
        self.buf.append_u8(b.into())
    }

    fn put_string(&mut self, s: &[u8]) -> Result<(), EncodingError> {
        if s.len() < u16::MAX as usize {
            self.buf.append_u8(STRING)?;
            return self.buf.append_prefixed::<u16>(s);
        }

        let len = s.len().min(u32::MAX as usize);
        if len < s.len() {
            warn!(original_len = s.len(), "Long string truncated to {len} bytes.");
        }
        self.buf.append_u8(LONG_STRING)?;
        self.buf.append_prefixed::<u32>(&s[..len])
    }

    fn put_avmplus_object(&mut self, value: &AmfValue) -> Result<(), EncodingError> {
        self.buf.append_u8(AVMPLUS_OBJECT)?;
        Amf3EncoderState::nested(&mut *self.buf, self.depth, self.max_depth).put_value(value)
    }

    fn put_strict_array(&mut self, arr: &Handle<Vec<AmfValue>>) -> Result<(), EncodingError> {
        if self.put_reference(arr.id())? {
            return Ok(());
        }

        let values = arr.borrow();
        if values.is_empty() {
            return self.buf.append_u8(NULL);
        }
        if values.len() > u32::MAX as usize {
            return Err(EncodingError::ArrayTooLong(values.len()));
        }

        self.remember(arr.id());
        self.enter()?;
        self.buf.append_u8(STRICT_ARRAY)?;
        self.buf.append_be_u32(values.len() as u32)?;
        for value in values.iter() {
            self.put_value(value)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn put_object(&mut self, obj: &Handle<AmfObject>) -> Result<(), EncodingError> {
        if self.put_reference(obj.id())? {
            return Ok(());
        }

        let object = obj.borrow();
        let class_name = object.class_name.clone().or_else(|| {
            object
                .get(ALIAS_KEY.as_bytes())
                .and_then(AmfValue::as_bytes)
                .cloned()
        });
        if object.is_empty() && class_name.is_none() {
            return self.buf.append_u8(NULL);
        }

        self.remember(obj.id());
        self.enter()?;
        let typed = class_name.is_some();
        match class_name {
            Some(class_name) => {
                self.buf.append_u8(TYPED_OBJECT)?;
                self.put_key(&class_name)?;
            }
            None => self.buf.append_u8(OBJECT)?,
        }

        for (key, value) in object.members.iter() {
            if typed && key.as_ref() == ALIAS_KEY.as_bytes() {
                continue;
            }
            if key.is_empty() {
                warn!("Skipping object member with an empty key.");
                continue;
            }
            self.put_key(key)?;
            self.put_value(value)?;
        }
        self.put_object_end()?;
        self.depth -= 1;
        Ok(())
    }

    fn put_key(&mut self, key: &[u8]) -> Result<(), EncodingError> {
        if key.len() > u16::MAX as usize {
            return Err(EncodingError::StringTooLong(key.len()));
        }
        self.buf.append_prefixed::<u16>(key)
    }

    fn put_object_end(&mut self) -> Result<(), EncodingError> {
        self.buf.append_be_u16(0)?;
        self.buf.append_u8(OBJECT_END)
    }

    /// Writes a back-reference if the slot was already encoded in this call.
    fn put_reference(&mut self, id: usize) -> Result<bool, EncodingError> {
        let Some(&idx) = self.complexes.get(&id) else {
            return Ok(false);
        };
        if idx > u16::MAX as usize {
            return Err(EncodingError::ReferenceOverflow(idx));
        }
        self.buf.append_u8(REFERENCE)?;
        self.buf.append_be_u16(idx as u16)?;
        Ok(true)
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

#[cfg(test)]
mod encode_test {
    use bytes::{Bytes, BytesMut};

    use crate::{AmfObject, AmfValue, CodecOptions, EncodingError, amf0::*};

    #[test]
    fn encode_number_test() {
        let actual = encode_amf0(&AmfValue::Number(42.0), false).unwrap();
        let expected = Bytes::from_iter([NUMBER, 0x40, 0x45, 0, 0, 0, 0, 0, 0]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn encode_scalars_test() {
        assert_eq!(encode_amf0(&AmfValue::Null, false).unwrap(), Bytes::from_iter([NULL]));
        assert_eq!(
            encode_amf0(&AmfValue::Undefined, false).unwrap(),
            Bytes::from_iter([UNDEFINED])
        );
        assert_eq!(
            encode_amf0(&AmfValue::Boolean(true), false).unwrap(),
            Bytes::from_iter([BOOLEAN, 0x01])
        );
        assert_eq!(
            encode_amf0(&AmfValue::string("hi"), false).unwrap(),
            Bytes::from_iter([STRING, 0x00, 0x02, b'h', b'i'])
        );
    }

    #[test]
    fn encode_long_string_test() {
        let long = vec![b'x'; u16::MAX as usize];
        let actual = encode_amf0(&AmfValue::string(long.clone()), false).unwrap();
        assert_eq!(actual[0], LONG_STRING);
        assert_eq!(actual[1..5], [0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(actual.len(), 5 + long.len());

        let just_short = vec![b'x'; u16::MAX as usize - 1];
        let actual = encode_amf0(&AmfValue::string(just_short), false).unwrap();
        assert_eq!(actual[..3], [STRING, 0xFF, 0xFE]);
    }

    #[test]
    fn encode_object_test() {
        let object: AmfObject = [("a", AmfValue::Number(1.0))].into_iter().collect();
        let actual = encode_amf0(&object.into(), false).unwrap();
        let expected = Bytes::from_iter([
            OBJECT, 0x00, 0x01, b'a', NUMBER, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0, 0x00, 0x00, OBJECT_END,
        ]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn encode_empty_composites_as_null() {
        assert_eq!(
            encode_amf0(&AmfValue::array(vec![]), false).unwrap(),
            Bytes::from_iter([NULL])
        );
        assert_eq!(
            encode_amf0(&AmfValue::object(AmfObject::new()), false).unwrap(),
            Bytes::from_iter([NULL])
        );
    }

    #[test]
    fn encode_shared_array_as_reference() {
        let shared = AmfValue::array(vec![AmfValue::Boolean(false)]);
        let outer = AmfValue::array(vec![shared.clone(), shared]);
        let actual = encode_amf0(&outer, false).unwrap();
        let expected = Bytes::from_iter([
            STRICT_ARRAY,
            0,
            0,
            0,
            2,
            STRICT_ARRAY,
            0,
            0,
            0,
            1,
            BOOLEAN,
            0,
            REFERENCE,
            0,
            1,
        ]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn encode_typed_object_from_class_name() {
        let mut object = AmfObject::with_class_name("T");
        object.insert("k", AmfValue::Null);
        let actual = encode_amf0(&object.into(), false).unwrap();
        let expected = Bytes::from_iter([
            TYPED_OBJECT,
            0,
            1,
            b'T',
            0,
            1,
            b'k',
            NULL,
            0,
            0,
            OBJECT_END,
        ]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn encode_avmplus_escape() {
        let value = AmfValue::array(vec![AmfValue::Number(1.0)]);
        let actual = encode_amf0(&value, true).unwrap();
        // AVM+ marker, AMF3 array, 1 dense element, no associative keys, integer 1.
        let expected = Bytes::from_iter([AVMPLUS_OBJECT, 0x09, 0x03, 0x01, 0x04, 0x01]);
        assert_eq!(actual, expected);

        // Scalars are not escaped.
        let actual = encode_amf0(&AmfValue::Number(1.0), true).unwrap();
        assert_eq!(actual[0], NUMBER);
    }

    #[test]
    fn encode_nesting_limit() {
        let mut value = AmfValue::array(vec![AmfValue::Null]);
        for _ in 0..4 {
            value = AmfValue::array(vec![value]);
        }
        let options = CodecOptions { max_depth: 3 };
        let err = encode_amf0_with(&value, false, &options).unwrap_err();
        assert_eq!(err, EncodingError::NestingTooDeep(3));
    }

    #[test]
    fn encode_avmplus_nesting_limit() {
        let value = AmfValue::array(vec![AmfValue::array(vec![AmfValue::array(vec![
            AmfValue::Null,
        ])])]);
        let options = CodecOptions { max_depth: 2 };
        let err = encode_amf0_with(&value, true, &options).unwrap_err();
        assert_eq!(err, EncodingError::NestingTooDeep(2));

        let options = CodecOptions { max_depth: 3 };
        assert!(encode_amf0_with(&value, true, &options).is_ok());
    }

    #[test]
    fn encode_into_failure_leaves_sink_untouched() {
        let value = AmfValue::array(vec![
            AmfValue::string("visible"),
            AmfValue::array(vec![AmfValue::Null]),
        ]);
        let mut sink = BytesMut::from(&b"hdr"[..]);
        let options = CodecOptions { max_depth: 1 };
        let err = encode_amf0_into(&mut sink, &value, false, &options).unwrap_err();
        assert_eq!(err, EncodingError::NestingTooDeep(1));
        assert_eq!(&sink[..], b"hdr");

        let mut storage = [0u8; 4];
        let err = encode_amf0_into(&mut storage[..], &AmfValue::string("abc"), false, &options)
            .unwrap_err();
        assert_eq!(
            err,
            EncodingError::AllocationFailure {
                requested: 6,
                available: 4
            }
        );
        assert_eq!(storage, [0; 4]);
    }

    #[test]
    fn encode_reference_overflow() {
        let values: Vec<AmfValue> = (0..=u16::MAX as usize + 1)
            .map(|_| AmfValue::array(vec![AmfValue::Null]))
            .collect();
        let last = values[values.len() - 1].clone();
        let mut values = values;
        values.push(last);

        let err = encode_amf0(&AmfValue::array(values), false).unwrap_err();
        assert_eq!(err, EncodingError::ReferenceOverflow(u16::MAX as usize + 2));
    }
}
