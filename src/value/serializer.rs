use crate::error::TemplateError;
use crate::value::Value;
use serde::Serialize;
use serde::ser::*;

use std::collections::BTreeMap;

/// Converts any serializable caller data into a template [`Value`].
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> crate::Result<Value> {
    value.serialize(ValueSerializer)
}

pub struct ValueSerializer;

/// Wraps the content of an enum variant as `{variant: value}`, the
/// externally tagged form `serde_json` uses, so variants stay distinct.
fn tagged(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(name) => Value::Map(BTreeMap::from([(name.to_string(), value)])),
        None => value,
    }
}

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = TemplateError;
    type SerializeSeq = ListSerializer;
    type SerializeTuple = ListSerializer;
    type SerializeTupleStruct = ListSerializer;
    type SerializeTupleVariant = ListSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = MapSerializer;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v))
    }
    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(Value::from(v))
    }
    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        Ok(Value::F64(v as f64))
    }
    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        Ok(Value::F64(v))
    }
    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Str(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Str(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(Value::List(v.iter().map(|b| Value::I64(*b as i64)).collect()))
    }
    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Null)
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Null)
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Null)
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Str(variant.to_string()))
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(tagged(Some(variant), value.serialize(self)?))
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(ListSerializer {
            vec: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
        })
    }
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(ListSerializer {
            vec: Vec::with_capacity(len),
            variant: Some(variant),
        })
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            map: BTreeMap::new(),
            key: None,
            variant: None,
        })
    }
    fn serialize_struct(
        self,
        _: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.serialize_map(None)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer {
            map: BTreeMap::new(),
            key: None,
            variant: Some(variant),
        })
    }
}

pub struct ListSerializer {
    vec: Vec<Value>,
    /// Set for tuple variants.
    variant: Option<&'static str>,
}

macro_rules! impl_serialize_seq {
    ($trait:ident, $method:ident) => {
        impl $trait for ListSerializer {
            type Ok = Value;
            type Error = TemplateError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
                self.vec.push(value.serialize(ValueSerializer)?);
                Ok(())
            }

            fn end(self) -> Result<Self::Ok, Self::Error> {
                Ok(tagged(self.variant, Value::List(self.vec)))
            }
        }
    };
}

impl_serialize_seq!(SerializeSeq, serialize_element);
impl_serialize_seq!(SerializeTuple, serialize_element);
impl_serialize_seq!(SerializeTupleStruct, serialize_field);
impl_serialize_seq!(SerializeTupleVariant, serialize_field);

pub struct MapSerializer {
    map: BTreeMap<String, Value>,
    /// Key waiting for its value.
    key: Option<String>,
    /// Set for struct variants.
    variant: Option<&'static str>,
}

impl SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = TemplateError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        match key.serialize(ValueSerializer)? {
            Value::Str(s) => self.key = Some(s),
            // Numeric and boolean keys are stringified, as JSON objects do.
            k @ (Value::I64(_) | Value::F64(_) | Value::Bool(_)) => self.key = Some(k.to_string()),
            other => {
                return Err(TemplateError::SerializationError(format!(
                    "Map key must be a string, got {}",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let v = value.serialize(ValueSerializer)?;
        let key = self.key.take().ok_or_else(|| {
            TemplateError::SerializationError("Missing key for value".to_string())
        })?;
        self.map.insert(key, v);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Value::Map(self.map))
    }
}

macro_rules! impl_serialize_struct {
    ($trait:ident) => {
        impl $trait for MapSerializer {
            type Ok = Value;
            type Error = TemplateError;

            fn serialize_field<T: ?Sized + Serialize>(
                &mut self,
                key: &'static str,
                value: &T,
            ) -> Result<(), Self::Error> {
                let v = value.serialize(ValueSerializer)?;
                self.map.insert(key.to_string(), v);
                Ok(())
            }

            fn end(self) -> Result<Self::Ok, Self::Error> {
                Ok(tagged(self.variant, Value::Map(self.map)))
            }
        }
    };
}

impl_serialize_struct!(SerializeStruct);
impl_serialize_struct!(SerializeStructVariant);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Profile {
        name: String,
        age: u32,
        tags: Vec<&'static str>,
        city: Option<String>,
    }

    #[test]
    fn test_struct_becomes_map() {
        let profile = Profile {
            name: "Alice".to_string(),
            age: 30,
            tags: vec!["a", "b"],
            city: None,
        };
        let value = to_value(&profile).unwrap();
        let Value::Map(map) = value else {
            panic!("Expected Value::Map, got {:?}", value);
        };
        assert_eq!(map.get("name"), Some(&Value::Str("Alice".to_string())));
        assert_eq!(map.get("age"), Some(&Value::I64(30)));
        assert_eq!(map.get("tags"), Some(&Value::from(vec!["a", "b"])));
        assert_eq!(map.get("city"), Some(&Value::Null));
    }

    #[derive(Serialize)]
    enum Event {
        Opened,
        Clicked(u32),
        Bounced(u32),
        Moved(i64, i64),
        Replied { subject: String },
    }

    #[test]
    fn test_enum_variants_are_tagged() {
        assert_eq!(to_value(&Event::Opened).unwrap(), Value::from("Opened"));
        assert_ne!(
            to_value(&Event::Clicked(1)).unwrap(),
            to_value(&Event::Bounced(1)).unwrap()
        );
        for (event, expected) in [
            (Event::Clicked(1), serde_json::json!({"Clicked": 1})),
            (Event::Moved(2, -3), serde_json::json!({"Moved": [2, -3]})),
            (
                Event::Replied {
                    subject: "Re".to_string(),
                },
                serde_json::json!({"Replied": {"subject": "Re"}}),
            ),
        ] {
            let expected = Value::from(expected);
            assert_eq!(to_value(&event).unwrap(), expected);
            // Same shape as serde_json gives the same enum.
            assert_eq!(Value::from(serde_json::to_value(&event).unwrap()), expected);
        }
    }

    #[test]
    fn test_unit_is_null() {
        assert_eq!(to_value(&()).unwrap(), Value::Null);
    }

    #[test]
    fn test_numeric_map_keys_are_stringified() {
        let mut map = HashMap::new();
        map.insert(1, "one");
        let value = to_value(&map).unwrap();
        assert_eq!(value, Value::from(serde_json::json!({"1": "one"})));
    }

    #[test]
    fn test_list_key_rejected() {
        let mut map = HashMap::new();
        map.insert(vec![1], "one");
        assert!(matches!(
            to_value(&map),
            Err(TemplateError::SerializationError(_))
        ));
    }
}
