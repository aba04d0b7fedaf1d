//! Serialize Rust data structures into command arguments.
//!
//! The root value must be sequence-like, like a tuple `("SET", "key", 42)`
//! or a `Vec<String>`. Its first element becomes the command name.
//!
//! - Strings and byte slices are written as is.
//! - Integers and floats are formatted in their decimal form, booleans as `1` or `0`.
//! - `None` and unit elements are skipped, so `Option<("EX", u64)>` works as an optional clause.
//! - Nested sequences, tuples, maps and structs are flattened one level,
//!   maps and structs as field/value pairs.
//!   Anything nested deeper is rejected.

use std::fmt;

use bytes::Bytes;
use paste::paste;
use serde::ser::{self, Serialize};

/// Serialize the request into the list of arguments, command name first.
///
/// ```
/// # use pipedis::resp2::ser_cmd::to_args;
/// let args = to_args(&("SET", "key", 42, Some(("EX", 10)), None::<&str>))?;
/// assert_eq!(vec!["SET", "key", "42", "EX", "10"], args);
/// # Ok::<_, pipedis::resp2::ser_cmd::Error>(())
/// ```
pub fn to_args<T: Serialize + ?Sized>(value: &T) -> Result<Vec<Bytes>, Error> {
    let mut args = Vec::new();
    value.serialize(ArgsSerializer { args: &mut args })?;
    if args.is_empty() {
        return Err(Error::EmptyCommand);
    }
    Ok(args)
}

/// Errors that may occur when serializing commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Serde related error.
    #[error("serde: {0}")]
    Serde(String),
    /// Only sequence-like types are supported as a command root.
    #[error("only sequence-like types are supported as a command root")]
    NotSequenceRoot,
    /// Types nested more than 2 depth are not supported.
    #[error("types nested more than 2 depth are not supported")]
    NestedTooDeep,
    /// The request produced no command name.
    #[error("command has no name")]
    EmptyCommand,
}

#[derive(Debug)]
struct ArgsSerializer<'a> {
    args: &'a mut Vec<Bytes>,
}

#[derive(Debug)]
struct FlatSerializer<'a> {
    args: &'a mut Vec<Bytes>,
}

#[derive(Debug)]
struct BlobSerializer<'a> {
    args: &'a mut Vec<Bytes>,
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::Serde(msg.to_string())
    }
}

fn put<T: AsRef<[u8]> + ?Sized>(args: &mut Vec<Bytes>, blob: &T) {
    args.push(Bytes::copy_from_slice(blob.as_ref()));
}

impl<'a> ArgsSerializer<'a> {
    fn elem<T: Serialize + ?Sized>(&mut self, elem: &T) -> Result<(), Error> {
        elem.serialize(FlatSerializer { args: self.args })
    }
}

impl<'a> FlatSerializer<'a> {
    fn blob(&mut self) -> BlobSerializer<'_> {
        BlobSerializer { args: self.args }
    }
}

macro_rules! unsupported_not_seq {
    ($($name:ident)*) => {paste!{$(
        fn [<serialize_ $name>](self, _v: $name) -> Result<Self::Ok, Self::Error> {
            Err(Error::NotSequenceRoot)
        }
    )*}};
}

macro_rules! forward_blob {
    ($($name:ident)*) => {paste!{$(
        fn [<serialize_ $name>](mut self, v: $name) -> Result<Self::Ok, Self::Error> {
            self.blob().[<serialize_ $name>](v)
        }
    )*}};
}

macro_rules! serialize_int {
    ($($int:ident)*) => {paste!{$(
        fn [<serialize_ $int>](self, v: $int) -> Result<Self::Ok, Self::Error> {
            let mut buf = itoa::Buffer::new();
            put(self.args, buf.format(v));
            Ok(())
        }
    )*}};
}

macro_rules! serialize_float {
    ($($float:ident)*) => {paste!{$(
        fn [<serialize_ $float>](self, v: $float) -> Result<Self::Ok, Self::Error> {
            let mut buf = ryu::Buffer::new();
            put(self.args, buf.format(v));
            Ok(())
        }
    )*}};
}

/// Implements the compound serializer traits by handing every element to `$each`.
macro_rules! compound {
    ($ty:ident, $each:ident) => {
        impl<'a> ser::SerializeSeq for $ty<'a> {
            type Ok = ();
            type Error = Error;

            fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
                self.$each(value)
            }

            fn end(self) -> Result<(), Error> {
                Ok(())
            }
        }

        impl<'a> ser::SerializeTuple for $ty<'a> {
            type Ok = ();
            type Error = Error;

            fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
                self.$each(value)
            }

            fn end(self) -> Result<(), Error> {
                Ok(())
            }
        }

        impl<'a> ser::SerializeTupleStruct for $ty<'a> {
            type Ok = ();
            type Error = Error;

            fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
                self.$each(value)
            }

            fn end(self) -> Result<(), Error> {
                Ok(())
            }
        }

        impl<'a> ser::SerializeTupleVariant for $ty<'a> {
            type Ok = ();
            type Error = Error;

            fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
                self.$each(value)
            }

            fn end(self) -> Result<(), Error> {
                Ok(())
            }
        }
    };
}

compound!(ArgsSerializer, elem);

impl<'a> ser::Serializer for ArgsSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = ser::Impossible<(), Error>;
    type SerializeStruct = ser::Impossible<(), Error>;
    type SerializeStructVariant = ser::Impossible<(), Error>;

    unsupported_not_seq!(bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64);

    // char, str, bytes and unit-variant are allowed to write command without arguments

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        put(self.args, v.encode_utf8(&mut [0; 4]));
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        put(self.args, v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        put(self.args, v);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_some<T: ?Sized>(self, _value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        mut self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        put(self.args, variant);
        self.elem(value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        put(self.args, variant);
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(Error::NotSequenceRoot)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(Error::NotSequenceRoot)
    }
}

impl<'a> FlatSerializer<'a> {
    fn each<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        value.serialize(self.blob())
    }
}

compound!(FlatSerializer, each);

impl<'a> ser::Serializer for FlatSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    forward_blob!(bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char);

    fn serialize_str(mut self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.blob().serialize_str(v)
    }

    fn serialize_bytes(mut self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.blob().serialize_bytes(v)
    }

    /// Doesn't put anything on None
    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    /// Doesn't put anything on Unit-like types
    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        put(self.args, variant);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        put(self.args, variant);
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        put(self.args, variant);
        Ok(self)
    }
}

impl<'a> ser::SerializeMap for FlatSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        key.serialize(self.blob())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(self.blob())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for FlatSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        key.serialize(self.blob())?;
        value.serialize(self.blob())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for FlatSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        key.serialize(self.blob())?;
        value.serialize(self.blob())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a> ser::Serializer for BlobSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = ser::Impossible<(), Error>;
    type SerializeTuple = ser::Impossible<(), Error>;
    type SerializeTupleStruct = ser::Impossible<(), Error>;
    type SerializeTupleVariant = ser::Impossible<(), Error>;
    type SerializeMap = ser::Impossible<(), Error>;
    type SerializeStruct = ser::Impossible<(), Error>;
    type SerializeStructVariant = ser::Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        put(self.args, if v { "1" } else { "0" });
        Ok(())
    }

    serialize_int!(i8 i16 i32 i64 i128 u8 u16 u32 u64 u128);
    serialize_float!(f32 f64);

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        put(self.args, v.encode_utf8(&mut [0; 4]));
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        put(self.args, v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        put(self.args, v);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    /// Nested unit takes its position as an empty argument.
    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        put(self.args, "");
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize,
    {
        Err(Error::NestedTooDeep)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(Error::NestedTooDeep)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(Error::NestedTooDeep)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn flat_arguments() {
        let args = to_args(&("INCRBYFLOAT", "k", 1.5f64, true, 'x')).unwrap();
        assert_eq!(vec!["INCRBYFLOAT", "k", "1.5", "1", "x"], args);
    }

    #[test]
    fn single_name() {
        assert_eq!(vec!["PING"], to_args("PING").unwrap());
        assert_eq!(vec!["PING"], to_args(&["PING"]).unwrap());
    }

    #[test]
    fn binary_arguments() {
        let value = serde_bytes_like(b"a\r\n\0b");
        let args = to_args(&("SET", "k", value)).unwrap();
        assert_eq!(&b"a\r\n\0b"[..], &args[2][..]);
    }

    #[test]
    fn nested_sequences_flatten_once() {
        let keys = vec!["a", "b"];
        assert_eq!(vec!["DEL", "a", "b"], to_args(&("DEL", &keys)).unwrap());

        let mut fields = BTreeMap::new();
        fields.insert("f1", 1);
        fields.insert("f2", 2);
        assert_eq!(
            vec!["HSET", "h", "f1", "1", "f2", "2"],
            to_args(&("HSET", "h", &fields)).unwrap()
        );

        assert_eq!(
            Err(Error::NestedTooDeep),
            to_args(&("DEL", vec![vec!["a"]]))
        );
    }

    #[test]
    fn invalid_roots() {
        assert_eq!(Err(Error::NotSequenceRoot), to_args(&42));
        assert_eq!(Err(Error::EmptyCommand), to_args(&Vec::<String>::new()));
    }

    fn serde_bytes_like(bytes: &'static [u8]) -> impl Serialize {
        struct Raw(&'static [u8]);
        impl Serialize for Raw {
            fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(self.0)
            }
        }
        Raw(bytes)
    }
}
