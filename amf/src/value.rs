use std::{
    cell::{Ref, RefCell, RefMut},
    collections::{HashMap, hash_map::Entry},
    rc::Rc,
};

use bytes::Bytes;

/// Member key under which AMF0 typed objects carry their class name.
pub const ALIAS_KEY: &str = "__amf_alias__";

/// Shared, mutable slot for a composite value.
///
/// Two handles are the same value only if they point to the same slot ([`Handle::ptr_eq`]).
/// `PartialEq` and `Debug` compare/print the contents, so they must not be used on cyclic
/// graphs. Cycles built from handles are never freed unless the caller breaks them.
#[derive(Debug, Default, PartialEq)]
pub struct Handle<T>(Rc<RefCell<T>>);

impl<T> Handle<T> {
    pub fn new(inner: T) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the slot, stable for as long as any handle to it is alive.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmfObject {
    pub class_name: Option<Bytes>,
    pub members: Vec<(Bytes, AmfValue)>,
    pub dynamic: bool,
    pub external: bool,
}

impl AmfObject {
    /// Anonymous, dynamic object without members.
    pub fn new() -> Self {
        Self {
            class_name: None,
            members: Vec::new(),
            dynamic: true,
            external: false,
        }
    }

    pub fn with_class_name(class_name: impl Into<Bytes>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::new()
        }
    }

    /// Sets `key`, replacing the value of an existing member in place.
    pub fn insert(&mut self, key: impl Into<Bytes>, value: AmfValue) {
        let key = key.into();
        match self.members.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.members.push((key, value)),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&AmfValue> {
        self.members
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<AmfValue> {
        let idx = self.members.iter().position(|(k, _)| k.as_ref() == key)?;
        Some(self.members.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Key to member index of an object being filled from the wire.
///
/// Keeps a repeated key overwriting the earlier member in place without rescanning the members
/// for every pair.
#[derive(Debug, Default)]
pub(crate) struct MemberSlots(HashMap<Bytes, usize>);

impl MemberSlots {
    pub(crate) fn insert(&mut self, object: &Handle<AmfObject>, key: Bytes, value: AmfValue) {
        let mut object = object.borrow_mut();
        match self.0.entry(key) {
            Entry::Occupied(slot) => object.members[*slot.get()].1 = value,
            Entry::Vacant(slot) => {
                object.members.push((slot.key().clone(), value));
                slot.insert(object.members.len() - 1);
            }
        }
    }
}

impl Default for AmfObject {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<Bytes>> FromIterator<(K, AmfValue)> for AmfObject {
    fn from_iter<I: IntoIterator<Item = (K, AmfValue)>>(iter: I) -> Self {
        let mut object = AmfObject::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

/// Value model shared by the AMF0 and AMF3 codecs.
///
/// Strings are raw bytes. Arrays and objects live behind [`Handle`]s so that the encoders can
/// detect shared and cyclic sub-graphs and the decoders can rebuild them.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Bytes),
    Array(Handle<Vec<AmfValue>>),
    Object(Handle<AmfObject>),
}

impl AmfValue {
    pub fn string(s: impl Into<Bytes>) -> Self {
        AmfValue::String(s.into())
    }

    pub fn array(values: Vec<AmfValue>) -> Self {
        AmfValue::Array(Handle::new(values))
    }

    pub fn object(object: AmfObject) -> Self {
        AmfValue::Object(Handle::new(object))
    }

    /// `true` for both `Null` and `Undefined`.
    pub fn is_null(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Handle<Vec<AmfValue>>> {
        match self {
            AmfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Handle<AmfObject>> {
        match self {
            AmfValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Identity of a composite value, `None` for scalars.
    pub fn composite_id(&self) -> Option<usize> {
        match self {
            AmfValue::Array(a) => Some(a.id()),
            AmfValue::Object(o) => Some(o.id()),
            _ => None,
        }
    }

    /// `true` if both values are the same composite slot.
    pub fn same_composite(&self, other: &AmfValue) -> bool {
        match (self.composite_id(), other.composite_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for AmfValue {
    fn from(b: bool) -> Self {
        AmfValue::Boolean(b)
    }
}

impl From<f64> for AmfValue {
    fn from(n: f64) -> Self {
        AmfValue::Number(n)
    }
}

impl From<&'static str> for AmfValue {
    fn from(s: &'static str) -> Self {
        AmfValue::String(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for AmfValue {
    fn from(s: String) -> Self {
        AmfValue::String(Bytes::from(s))
    }
}

impl From<Bytes> for AmfValue {
    fn from(s: Bytes) -> Self {
        AmfValue::String(s)
    }
}

impl From<Vec<AmfValue>> for AmfValue {
    fn from(values: Vec<AmfValue>) -> Self {
        AmfValue::array(values)
    }
}

impl From<AmfObject> for AmfValue {
    fn from(object: AmfObject) -> Self {
        AmfValue::object(object)
    }
}

#[cfg(test)]
mod value_test {
    use super::*;

    #[test]
    fn test_member_slots_overwrite_in_place() {
        let object = Handle::new(AmfObject::new());
        let mut slots = MemberSlots::default();
        slots.insert(&object, Bytes::from_static(b"a"), AmfValue::Number(1.0));
        slots.insert(&object, Bytes::from_static(b"b"), AmfValue::Number(2.0));
        slots.insert(&object, Bytes::from_static(b"a"), AmfValue::Number(3.0));

        let object = object.borrow();
        assert_eq!(
            object.members,
            vec![
                (Bytes::from_static(b"a"), AmfValue::Number(3.0)),
                (Bytes::from_static(b"b"), AmfValue::Number(2.0)),
            ]
        );
    }

    #[test]
    fn test_handle_identity() {
        let a = Handle::new(vec![AmfValue::Null]);
        let b = a.clone();
        let c = Handle::new(vec![AmfValue::Null]);

        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.ptr_eq(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn test_object_insert_replaces_in_place() {
        let mut object = AmfObject::new();
        object.insert("a", AmfValue::Number(1.0));
        object.insert("b", AmfValue::Number(2.0));
        object.insert("a", AmfValue::Number(3.0));

        let keys: Vec<&[u8]> = object.members.iter().map(|(k, _)| k.as_ref()).collect();
        assert_eq!(keys, vec![b"a".as_ref(), b"b".as_ref()]);
        assert_eq!(object.get(b"a"), Some(&AmfValue::Number(3.0)));
    }
}
