use std::error::Error as StdError;
use std::fmt;
use std::slice;

use serde::de::{
    DeserializeSeed, Deserializer, Error as SerdeError, IntoDeserializer,
    MapAccess, SeqAccess, Unexpected, Visitor,
};
use serde::forward_to_deserialize_any;

use crate::mapping::{FieldMapping, Value};

use self::DeserializeErrorKind as DEK;

/// Deserializes one record from the values bound for a line.
///
/// Structs and maps see one entry per field rule, keyed by the rule's name,
/// plus the align index entry when the mapping asks for one. Tuples and
/// sequences see the values in rule order. Anything else is deserialized
/// from the only value of a single-rule mapping.
pub struct DeRecord<'r> {
    mapping: &'r FieldMapping,
    values: &'r [Value],
    align_index: usize,
    field: usize,
    align_done: bool,
}

impl<'r> DeRecord<'r> {
    pub fn new(
        mapping: &'r FieldMapping,
        values: &'r [Value],
        align_index: usize,
    ) -> DeRecord<'r> {
        DeRecord { mapping, values, align_index, field: 0, align_done: false }
    }

    /// Returns the sole value of a single-rule mapping.
    fn single(&self) -> Result<DeValue<'r>, DeserializeError> {
        if self.values.len() != 1 {
            return Err(DeserializeError {
                field: None,
                kind: DEK::Unsupported(format!(
                    "cannot bind {} fields to a single value",
                    self.values.len()
                )),
            });
        }
        Ok(DeValue { value: &self.values[0] })
    }

    /// Takes the next value, tagging any error with its field index.
    fn next_field<'de, T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<T::Value, DeserializeError> {
        let field = self.field;
        let value = match self.values.get(field) {
            Some(value) => value,
            None => {
                return Err(DeserializeError {
                    field: None,
                    kind: DEK::UnexpectedEndOfRow,
                })
            }
        };
        self.field += 1;
        seed.deserialize(DeValue { value }).map_err(|err| err.at(field as u64))
    }
}

macro_rules! deserialize_single {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(
                self,
                visitor: V,
            ) -> Result<V::Value, Self::Error> {
                self.single()?.$method(visitor).map_err(|err| err.at(0))
            }
        )*
    }
}

impl<'a, 'de, 'r> Deserializer<'de> for &'a mut DeRecord<'r> {
    type Error = DeserializeError;

    deserialize_single! {
        deserialize_any deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char
        deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf
        deserialize_option deserialize_unit deserialize_identifier
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self)
    }

    fn deserialize_map<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?
            .deserialize_enum(name, variants, visitor)
            .map_err(|err| err.at(0))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

impl<'a, 'de, 'r> SeqAccess<'de> for &'a mut DeRecord<'r> {
    type Error = DeserializeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        if self.field >= self.values.len() {
            Ok(None)
        } else {
            self.next_field(seed).map(Some)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len() - self.field)
    }
}

impl<'a, 'de, 'r> MapAccess<'de> for &'a mut DeRecord<'r> {
    type Error = DeserializeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let key = match self.mapping.rules().get(self.field) {
            Some(rule) => rule.name(),
            None => match self.mapping.align_index_field() {
                Some(name) if !self.align_done => name,
                _ => return Ok(None),
            },
        };
        seed.deserialize(key.into_deserializer()).map(Some)
    }

    fn next_value_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<K::Value, Self::Error> {
        if self.field < self.values.len() {
            return self.next_field(seed);
        }
        self.align_done = true;
        seed.deserialize((self.align_index as u64).into_deserializer())
    }
}

/// Deserializes a single bound value.
///
/// Text requests for scalar values are served with the value's textual form,
/// so a numeric rule can still fill a `String` field.
struct DeValue<'v> {
    value: &'v Value,
}

impl<'v> DeValue<'v> {
    /// The textual form of a scalar value.
    fn text(&self) -> Option<String> {
        match *self.value {
            Value::Bool(b) => Some(b.to_string()),
            Value::Char(c) => Some(c.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::UInt(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::Absent | Value::Str(_) | Value::List(_) => None,
        }
    }
}

impl<'de, 'v> Deserializer<'de> for DeValue<'v> {
    type Error = DeserializeError;

    fn deserialize_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match *self.value {
            Value::Absent => visitor.visit_none(),
            Value::Str(ref s) => visitor.visit_str(s),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Char(c) => visitor.visit_char(c),
            Value::Int(n) => visitor.visit_i64(n),
            Value::UInt(n) => visitor.visit_u64(n),
            Value::Float(n) => visitor.visit_f64(n),
            Value::List(ref values) => {
                visitor.visit_seq(DeList { it: values.iter(), field: 0 })
            }
        }
    }

    fn deserialize_str<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.text() {
            Some(text) => visitor.visit_string(text),
            None => self.deserialize_any(visitor),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match *self.value {
            Value::Str(ref s) => visitor.visit_bytes(s.as_bytes()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match *self.value {
            Value::Absent => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match *self.value {
            Value::Absent => visitor.visit_unit(),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match *self.value {
            Value::Str(ref s) => visitor.visit_enum(s.as_str().into_deserializer()),
            _ => match self.text() {
                Some(text) => visitor.visit_enum(text.into_deserializer()),
                None => Err(DeserializeError::invalid_type(
                    Unexpected::Other("non-text value"),
                    &"an enum variant name",
                )),
            },
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char
        unit_struct seq tuple tuple_struct map struct identifier
    }
}

/// The elements of a multi-column field.
struct DeList<'v> {
    it: slice::Iter<'v, Value>,
    field: usize,
}

impl<'de, 'v> SeqAccess<'de> for DeList<'v> {
    type Error = DeserializeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        let value = match self.it.next() {
            None => return Ok(None),
            Some(value) => value,
        };
        let element = self.field;
        self.field += 1;
        seed.deserialize(DeValue { value }).map(Some).map_err(|mut err| {
            err.kind = DEK::Message(format!("element {}: {}", element, err.kind));
            err
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.it.len())
    }
}

/// An error that occurs when bound values do not fit the record type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeserializeError {
    field: Option<u64>,
    kind: DeserializeErrorKind,
}

/// The type of a deserialization error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeserializeErrorKind {
    /// A generic error message reported by the record's `Deserialize` impl.
    Message(String),
    /// The record's shape cannot be built from the mapping.
    Unsupported(String),
    /// The record asked for more values than the mapping has rules.
    UnexpectedEndOfRow,
}

impl DeserializeError {
    /// Return the index (starting at 0) of the field rule that failed, if
    /// available.
    pub fn field(&self) -> Option<u64> {
        self.field
    }

    /// Return the underlying error kind.
    pub fn kind(&self) -> &DeserializeErrorKind {
        &self.kind
    }

    /// Attach a field index, unless one is already known.
    fn at(mut self, field: u64) -> DeserializeError {
        if self.field.is_none() {
            self.field = Some(field);
        }
        self
    }
}

impl SerdeError for DeserializeError {
    fn custom<T: fmt::Display>(msg: T) -> DeserializeError {
        DeserializeError { field: None, kind: DEK::Message(msg.to_string()) }
    }
}

impl StdError for DeserializeError {}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(field) = self.field {
            write!(f, "field {}: {}", field, self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl fmt::Display for DeserializeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DEK::Message(ref msg) => write!(f, "{}", msg),
            DEK::Unsupported(ref which) => {
                write!(f, "unsupported record shape: {}", which)
            }
            DEK::UnexpectedEndOfRow => {
                write!(f, "expected field, but got end of row")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::{DeRecord, DeserializeError, DeserializeErrorKind};
    use crate::mapping::{FieldMapping, FieldRule, FieldType, Value};

    fn mapping(names: &[&str]) -> FieldMapping {
        let mut builder = FieldMapping::builder();
        for name in names {
            builder.field(*name, FieldType::Str);
        }
        builder.build().unwrap()
    }

    fn de<'d, D: Deserialize<'d>>(
        mapping: &FieldMapping,
        values: &[Value],
    ) -> Result<D, DeserializeError> {
        let mut deser = DeRecord::new(mapping, values, 0);
        D::deserialize(&mut deser)
    }

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn struct_by_name() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            z: f64,
            y: i32,
            x: String,
        }

        let m = mapping(&["x", "y", "z"]);
        let got: Foo =
            de(&m, &[s("hi"), Value::Int(42), Value::Float(1.3)]).unwrap();
        assert_eq!(got, Foo { x: "hi".into(), y: 42, z: 1.3 });
    }

    #[test]
    fn struct_missing_rule() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            y: i32,
            x: String,
        }

        let m = mapping(&["x"]);
        assert!(de::<Foo>(&m, &[s("hi")]).is_err());
    }

    #[test]
    fn struct_optional_absent() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            a: Option<i32>,
            b: String,
            c: Option<i32>,
        }

        let m = mapping(&["a", "b", "c"]);
        let got: Foo =
            de(&m, &[Value::Absent, s("foo"), Value::Int(5)]).unwrap();
        assert_eq!(got, Foo { a: None, b: "foo".into(), c: Some(5) });
    }

    #[test]
    fn absent_into_non_option_fails() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            a: i32,
        }

        let m = mapping(&["a"]);
        let err = de::<Foo>(&m, &[Value::Absent]).unwrap_err();
        assert_eq!(err.field(), Some(0));
    }

    #[test]
    fn align_index_entry() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            a: String,
            shift: usize,
        }

        let m = FieldMapping::builder()
            .field("a", FieldType::Str)
            .align_index("shift")
            .build()
            .unwrap();
        let values = [s("x")];
        let mut deser = DeRecord::new(&m, &values, 3);
        let got = Foo::deserialize(&mut deser).unwrap();
        assert_eq!(got, Foo { a: "x".into(), shift: 3 });
    }

    #[test]
    fn tuple_in_rule_order() {
        let m = mapping(&["a", "b"]);
        let got: (i32, bool) =
            de(&m, &[Value::Int(42), Value::Bool(true)]).unwrap();
        assert_eq!(got, (42, true));

        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo(i32, bool);

        let got: Foo = de(&m, &[Value::Int(42), Value::Bool(true)]).unwrap();
        assert_eq!(got, Foo(42, true));
    }

    #[test]
    fn tuple_too_long() {
        let m = mapping(&["a"]);
        let err = de::<(i32, i32)>(&m, &[Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("invalid length"));
    }

    #[test]
    fn single_value() {
        let m = mapping(&["a"]);
        let got: i32 = de(&m, &[Value::Int(7)]).unwrap();
        assert_eq!(got, 7);

        let two = mapping(&["a", "b"]);
        let err = de::<i32>(&two, &[Value::Int(7), Value::Int(8)]).unwrap_err();
        match *err.kind() {
            DeserializeErrorKind::Unsupported(_) => {}
            ref kind => panic!("unexpected kind {:?}", kind),
        }
    }

    #[test]
    fn narrowing_overflow() {
        let m = mapping(&["a"]);
        assert!(de::<u8>(&m, &[Value::Int(300)]).is_err());
        assert!(de::<u8>(&m, &[Value::Int(-1)]).is_err());
        assert_eq!(de::<u8>(&m, &[Value::Int(255)]).unwrap(), 255);
    }

    #[test]
    fn scalar_into_string() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            n: String,
            c: String,
        }

        let m = mapping(&["n", "c"]);
        let got: Foo = de(&m, &[Value::Int(-3), Value::Char('q')]).unwrap();
        assert_eq!(got, Foo { n: "-3".into(), c: "q".into() });
    }

    #[test]
    fn list_field() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            label: String,
            xs: Vec<Option<i64>>,
        }

        let m = FieldMapping::builder()
            .field("label", FieldType::Str)
            .rule(FieldRule::new("xs", FieldType::Int).rest())
            .build()
            .unwrap();
        let xs = Value::List(vec![Value::Int(1), Value::Absent, Value::Int(10)]);
        let got: Foo = de(&m, &[s("foo"), xs]).unwrap();
        assert_eq!(
            got,
            Foo { label: "foo".into(), xs: vec![Some(1), None, Some(10)] }
        );
    }

    #[test]
    fn enum_label() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Row {
            label: Label,
            x: f64,
        }

        #[derive(Deserialize, Debug, PartialEq)]
        #[serde(rename_all = "snake_case")]
        enum Label {
            Foo,
            Bar,
        }

        let m = mapping(&["label", "x"]);
        let got: Row = de(&m, &[s("bar"), Value::Float(5.0)]).unwrap();
        assert_eq!(got, Row { label: Label::Bar, x: 5.0 });
        assert!(de::<Row>(&m, &[s("quux"), Value::Float(5.0)]).is_err());
    }

    #[test]
    fn map_by_rule_name() {
        let m = mapping(&["a", "b"]);
        let got: HashMap<String, i64> =
            de(&m, &[Value::Int(1), Value::Int(5)]).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["a"], 1);
        assert_eq!(got["b"], 5);
    }
}
