use crate::{
    ALIAS_KEY, AmfObject, AmfValue,
    amf0::{decode_amf0, decode_amf0_values, encode_amf0, encode_amf0_values},
};

fn round_trip(value: &AmfValue) -> AmfValue {
    let encoded = encode_amf0(value, false).unwrap();
    let (decoded, consumed) = decode_amf0(&encoded).unwrap();
    assert_eq!(consumed, encoded.len());
    decoded
}

#[test]
fn test_scalars() {
    for value in [
        AmfValue::Number(-0.5),
        AmfValue::Boolean(false),
        AmfValue::Boolean(true),
        AmfValue::Null,
        AmfValue::Undefined,
        AmfValue::string("kremówki"),
        AmfValue::string(""),
    ] {
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn test_long_string() {
    let long = AmfValue::string(vec![b'y'; 70_000]);
    assert_eq!(round_trip(&long), long);
}

#[test]
fn test_nested_composites() {
    let mut inner = AmfObject::new();
    inner.insert("list", AmfValue::array(vec![AmfValue::Number(1.0), AmfValue::string("two")]));
    inner.insert("flag", AmfValue::Boolean(true));
    let mut outer = AmfObject::new();
    outer.insert("inner", AmfValue::object(inner));
    outer.insert("n", AmfValue::Number(3.5));

    let value = AmfValue::object(outer);
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_empty_composites_decode_as_null() {
    assert_eq!(round_trip(&AmfValue::array(vec![])), AmfValue::Null);
    assert_eq!(round_trip(&AmfValue::object(AmfObject::new())), AmfValue::Null);
}

#[test]
fn test_empty_composites_do_not_shift_references() {
    let empty = AmfValue::array(vec![]);
    let shared = AmfValue::array(vec![AmfValue::Boolean(true)]);
    let value = AmfValue::array(vec![empty.clone(), shared.clone(), empty, shared]);

    let decoded = round_trip(&value);
    let array = decoded.as_array().unwrap().borrow();
    assert_eq!(array[0], AmfValue::Null);
    assert_eq!(array[2], AmfValue::Null);
    assert!(array[1].same_composite(&array[3]));
}

#[test]
fn test_typed_object_round_trip() {
    let mut object = AmfObject::new();
    object.insert("a", AmfValue::Number(1.0));
    object.insert(ALIAS_KEY, AmfValue::string("flex.Thing"));
    let value = AmfValue::object(object);

    let encoded = encode_amf0(&value, false).unwrap();
    assert_eq!(encoded[0], 0x10);
    assert_eq!(decode_amf0(&encoded).unwrap().0, value);
}

#[test]
fn test_shared_and_cyclic_references() {
    let list = AmfValue::array(vec![AmfValue::Null]);
    if let AmfValue::Array(handle) = &list {
        handle.borrow_mut().push(list.clone());
    }

    let decoded = round_trip(&list);
    let handle = decoded.as_array().unwrap();
    let second = handle.borrow()[1].clone();
    assert!(second.as_array().unwrap().ptr_eq(handle));

    handle.borrow_mut().clear();
    if let AmfValue::Array(handle) = &list {
        handle.borrow_mut().clear();
    }
}

#[test]
fn test_avmplus_round_trip() {
    let mut object = AmfObject::new();
    object.insert("k", AmfValue::array(vec![AmfValue::Number(7.0)]));
    let value = AmfValue::object(object);

    let encoded = encode_amf0(&value, true).unwrap();
    assert_eq!(encoded[0], 0x11);
    let (decoded, consumed) = decode_amf0(&encoded).unwrap();
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded, value);
}

#[test]
fn test_command_values() {
    // connect('live', {app: 'live'}) as a command name followed by its arguments.
    let mut command_object = AmfObject::new();
    command_object.insert("app", AmfValue::string("live"));
    let values = vec![
        AmfValue::string("connect"),
        AmfValue::Number(1.0),
        AmfValue::object(command_object),
    ];

    let encoded = encode_amf0_values(&values).unwrap();
    assert_eq!(decode_amf0_values(&encoded).unwrap(), values);
    assert_eq!(encoded[..10], *b"\x02\x00\x07connect".as_slice());
    assert_eq!(encoded[10], 0x00);
}
