//! Strict interpreters which accept exactly one reply shape.
//!
//! Unlike the serde interpreter, these don't convert between reply types.
//! `interpret::integer` rejects `$2\r\n42\r\n` even though it looks like a number.

use bstr::BString;
use indexmap::IndexMap;

use crate::resp2::de::{invalid_reply, Error};
use crate::resp2::Reply;

/// `+OK`
pub fn ok(reply: Reply) -> Result<(), Error> {
    match reply {
        Reply::Status(msg) if msg.as_slice() == b"OK" => Ok(()),
        other => invalid_reply(other, "OK status"),
    }
}

/// `:<num>`
pub fn integer(reply: Reply) -> Result<i64, Error> {
    match reply {
        Reply::Integer(num) => Ok(num),
        other => invalid_reply(other, "integer"),
    }
}

/// `:0` or `:1`
pub fn boolean(reply: Reply) -> Result<bool, Error> {
    match reply {
        Reply::Integer(0) => Ok(false),
        Reply::Integer(1) => Ok(true),
        other => invalid_reply(other, "integer 0 or 1"),
    }
}

/// Bulk string, where nil is `None`.
pub fn nullable_bulk(reply: Reply) -> Result<Option<BString>, Error> {
    match reply {
        Reply::Bulk(msg) => Ok(msg),
        other => invalid_reply(other, "bulk string"),
    }
}

/// Flat array of bulk string field/value pairs, in the order the server sent.
pub fn pairs(reply: Reply) -> Result<IndexMap<BString, BString>, Error> {
    let elems = match reply {
        Reply::Array(Some(elems)) if elems.len() % 2 == 0 => elems,
        Reply::Array(Some(elems)) => return Err(Error::OddPairs(elems.len())),
        other => return invalid_reply(other, "array of field/value pairs"),
    };

    let mut map = IndexMap::with_capacity(elems.len() / 2);
    let mut iter = elems.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        map.insert(bulk(field)?, bulk(value)?);
    }
    Ok(map)
}

/// The reply as is.
pub fn raw(reply: Reply) -> Result<Reply, Error> {
    Ok(reply)
}

fn bulk(reply: Reply) -> Result<BString, Error> {
    match reply {
        Reply::Bulk(Some(msg)) => Ok(msg),
        other => invalid_reply(other, "bulk string"),
    }
}
