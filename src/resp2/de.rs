//! Deserialize Rust data structures from a [`Reply`](super::Reply).
//!
//! This is the default response interpreter of every [`Command`](crate::command::Command).
//! Scalars can be read from integers, status lines and bulk strings alike,
//! since the server returns numbers as bulk strings in many places.
//! Nil replies map to `None` or `()`. Flat arrays of field/value pairs,
//! like the `HGETALL` reply, can be read as maps and structs.

use std::{fmt, str, vec};

use bstr::BString;
use paste::paste;
use serde::de::{self, DeserializeOwned, IntoDeserializer};

use super::parse_str;
use super::reply::{Reply, ServerError};

/// Deserialize a `T` from the reply.
///
/// ```
/// # use pipedis::resp2::{de::from_reply, Reply};
/// let res: Option<String> = from_reply(Reply::Bulk(None))?;
/// assert_eq!(None, res);
/// let res: i64 = from_reply(Reply::bulk("42"))?;
/// assert_eq!(42, res);
/// # Ok::<_, pipedis::resp2::de::Error>(())
/// ```
pub fn from_reply<T: DeserializeOwned>(reply: Reply) -> Result<T, Error> {
    T::deserialize(Deserializer::new(reply))
}

/// A structure for deserializing Rust values from a reply.
#[derive(Debug)]
pub struct Deserializer {
    reply: Reply,
}

/// Errors that may occur when a reply doesn't fit the requested type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("custom: {0}")]
    Custom(String),
    #[error("error sent from the remote peer: {0}")]
    Remote(ServerError),
    #[error("integer overflowed")]
    IntegerOverflow,
    #[error("parse int failed")]
    ParseIntFailed,
    #[error("parse decimal number failed")]
    ParseDecimalFailed,
    #[error("parse single character failed")]
    ParseCharFailed,
    #[error("parse string failed")]
    ParseStrFailed,
    #[error("requested length is not match with the reply")]
    LengthMismatch,
    #[error("array of {0} elements can't be read as field/value pairs")]
    OddPairs(usize),
}

#[derive(Debug)]
struct SeqAccess {
    iter: vec::IntoIter<Reply>,
}

#[derive(Debug)]
struct MapAccess {
    iter: vec::IntoIter<Reply>,
}

impl Deserializer {
    pub fn new(reply: Reply) -> Self {
        Deserializer { reply }
    }

    fn into_blob(self) -> Result<BString, Error> {
        match self.reply {
            Reply::Status(msg) | Reply::Bulk(Some(msg)) => Ok(msg),
            Reply::Error(err) => Err(Error::Remote(err)),
            other => invalid_reply(other, "string"),
        }
    }

    fn into_string(self) -> Result<String, Error> {
        String::from_utf8(self.into_blob()?.into()).map_err(|_| Error::ParseStrFailed)
    }

    fn into_pairs(self, expected: &'static str) -> Result<MapAccess, Error> {
        match self.reply {
            Reply::Array(Some(elems)) if elems.len() % 2 == 0 => Ok(MapAccess {
                iter: elems.into_iter(),
            }),
            Reply::Array(Some(elems)) => Err(Error::OddPairs(elems.len())),
            Reply::Error(err) => Err(Error::Remote(err)),
            other => invalid_reply(other, expected),
        }
    }
}

macro_rules! deserialize_int {
    ($($int:ident)*) => {paste!{$(
        fn [<deserialize_ $int>]<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: de::Visitor<'de>,
        {
            match self.reply {
                Reply::Integer(num) => visitor.[<visit_ $int>](num.try_into().map_err(|_| Error::IntegerOverflow)?),
                Reply::Status(msg) | Reply::Bulk(Some(msg)) => visitor.[<visit_ $int>](parse_str(&msg).ok_or(Error::ParseIntFailed)?),
                Reply::Error(err) => Err(Error::Remote(err)),
                other => invalid_reply(other, "integer"),
            }
        }
    )*}};
}

macro_rules! deserialize_float {
    ($($float:ident)*) => {paste!{$(
        fn [<deserialize_ $float>]<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: de::Visitor<'de>,
        {
            match self.reply {
                Reply::Integer(num) => visitor.[<visit_ $float>](num as _),
                Reply::Status(msg) | Reply::Bulk(Some(msg)) => visitor.[<visit_ $float>](parse_str(&msg).ok_or(Error::ParseDecimalFailed)?),
                Reply::Error(err) => Err(Error::Remote(err)),
                other => invalid_reply(other, "decimal number"),
            }
        }
    )*}};
}

impl<'de> de::Deserializer<'de> for Deserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Status(msg) | Reply::Bulk(Some(msg)) => match String::from_utf8(msg.into()) {
                Ok(msg) => visitor.visit_string(msg),
                Err(err) => visitor.visit_byte_buf(err.into_bytes()),
            },
            Reply::Integer(num) => visitor.visit_i64(num),
            Reply::Bulk(None) | Reply::Array(None) => visitor.visit_unit(),
            Reply::Array(Some(elems)) => visitor.visit_seq(SeqAccess {
                iter: elems.into_iter(),
            }),
            Reply::Error(err) => Err(Error::Remote(err)),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Integer(1) => visitor.visit_bool(true),
            Reply::Integer(0) => visitor.visit_bool(false),
            Reply::Bulk(Some(ref msg)) if msg.as_slice() == b"1" => visitor.visit_bool(true),
            Reply::Bulk(Some(ref msg)) if msg.as_slice() == b"0" => visitor.visit_bool(false),
            Reply::Error(err) => Err(Error::Remote(err)),
            other => invalid_reply(other, "boolean"),
        }
    }

    deserialize_int!(i8 i16 i32 i64 i128 u8 u16 u32 u64 u128);
    deserialize_float!(f32 f64);

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let msg = self.into_string()?;
        visitor.visit_char(msg.parse().map_err(|_| Error::ParseCharFailed)?)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_string(self.into_string()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_string(self.into_string()?)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_byte_buf(self.into_blob()?.into())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_byte_buf(self.into_blob()?.into())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Bulk(None) | Reply::Array(None) => visitor.visit_none(),
            Reply::Error(err) => Err(Error::Remote(err)),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Status(_) | Reply::Bulk(None) | Reply::Array(None) => visitor.visit_unit(),
            Reply::Error(err) => Err(Error::Remote(err)),
            other => invalid_reply(other, "status or nil"),
        }
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Array(Some(elems)) => visitor.visit_seq(SeqAccess {
                iter: elems.into_iter(),
            }),
            // nil array reads as an empty sequence
            Reply::Array(None) => visitor.visit_seq(SeqAccess {
                iter: Vec::new().into_iter(),
            }),
            Reply::Error(err) => Err(Error::Remote(err)),
            other => invalid_reply(other, "array"),
        }
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if let Reply::Array(Some(elems)) = &self.reply {
            if elems.len() != len {
                return Err(Error::LengthMismatch);
            }
        }
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.into_pairs("field/value pairs")?)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.into_pairs("struct fields")?)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        // only unit variants, named by a status line or a bulk string
        visitor.visit_enum(self.into_string()?.into_deserializer())
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.reply {
            Reply::Error(err) => Err(Error::Remote(err)),
            _ => visitor.visit_unit(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for SeqAccess {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        self.iter
            .next()
            .map(|elem| seed.deserialize(Deserializer::new(elem)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

impl<'de> de::MapAccess<'de> for MapAccess {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        self.iter
            .next()
            .map(|key| seed.deserialize(Deserializer::new(key)))
            .transpose()
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        // the length is checked to be even on construction
        let value = self.iter.next().ok_or(Error::LengthMismatch)?;
        seed.deserialize(Deserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len() / 2)
    }
}

impl<'de> IntoDeserializer<'de, Error> for Reply {
    type Deserializer = Deserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        Deserializer::new(self)
    }
}

impl de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::Custom(msg.to_string())
    }
}

pub(crate) fn invalid_reply<T>(reply: Reply, expected: &'static str) -> Result<T, Error> {
    use de::{Error as _, Unexpected};

    let unexpected = match reply {
        Reply::Status(ref msg) => Unexpected::Other(match str::from_utf8(msg) {
            Ok(_) => "status line",
            Err(_) => "non UTF-8 status line",
        }),
        Reply::Integer(num) => Unexpected::Signed(num),
        Reply::Bulk(Some(ref msg)) => Unexpected::Bytes(msg),
        Reply::Bulk(None) => Unexpected::Other("nil bulk string"),
        Reply::Array(Some(_)) => Unexpected::Seq,
        Reply::Array(None) => Unexpected::Other("nil array"),
        Reply::Error(err) => return Err(Error::Remote(err)),
    };

    Err(Error::invalid_type(unexpected, &expected))
}
