//! The loosely typed Reply enum to represent a decoded RESP2 value.
//!
//! For more information, see the [`Reply`](self::Reply) type.

use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use super::token::{Message, Token};

/// Represents any valid RESP2 reply.
///
/// `Bulk(None)` and `Array(None)` are the protocol's nil markers.
/// They are distinct from `Bulk(Some(""))` and `Array(Some(vec![]))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reply {
    /// Status line like `OK` or `PONG`.
    Status(BString),
    /// Signed 64 bit integer.
    Integer(i64),
    /// Binary safe string, or nil.
    Bulk(Option<BString>),
    /// Array of replies, or nil.
    Array(Option<Vec<Reply>>),
    /// Error reported by the server.
    Error(ServerError),
}

/// Error reply sent by the server, like `-WRONGTYPE Operation against a key...`.
///
/// The first word is the error kind.
/// If the line has no space the whole line is the kind and the message is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{kind}{}", spaced(.message))]
pub struct ServerError {
    kind: BString,
    message: BString,
}

impl ServerError {
    /// Constructs a `ServerError` from its kind and message.
    pub fn new(kind: impl Into<BString>, message: impl Into<BString>) -> Self {
        ServerError {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Split the error line on its first space.
    pub fn parse(line: &[u8]) -> Self {
        match line.find_byte(b' ') {
            Some(idx) => ServerError::new(&line[..idx], &line[idx + 1..]),
            None => ServerError::new(line, ""),
        }
    }

    /// Error kind like `ERR` or `WRONGTYPE`.
    pub fn kind(&self) -> &BStr {
        self.kind.as_bstr()
    }

    /// Rest of the error line.
    pub fn message(&self) -> &BStr {
        self.message.as_bstr()
    }
}

impl Reply {
    /// `OK` status.
    pub fn ok() -> Self {
        Reply::Status("OK".into())
    }

    /// Non-nil bulk string.
    pub fn bulk(msg: impl Into<BString>) -> Self {
        Reply::Bulk(Some(msg.into()))
    }

    /// Returns the server error if this reply is one.
    pub fn as_error(&self) -> Option<&ServerError> {
        match self {
            Reply::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Converts the reply into `Err` if it is a server error.
    pub fn into_result(self) -> Result<Reply, ServerError> {
        match self {
            Reply::Error(err) => Err(err),
            other => Ok(other),
        }
    }

    /// Write the reply to the buffer in its wire format.
    pub fn put(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Status(msg) => Token::Simple(msg).put(buf),
            Reply::Integer(num) => Token::Integer(*num).put(buf),
            Reply::Bulk(msg) => Token::Bulk(msg.as_ref().map(|msg| msg.as_slice())).put(buf),
            Reply::Array(None) => Token::Array(None).put(buf),
            Reply::Array(Some(elems)) => {
                Token::Array(Some(elems.len())).put(buf);
                for elem in elems {
                    elem.put(buf);
                }
            }
            Reply::Error(err) => {
                let mut line = err.kind.clone();
                if !err.message.is_empty() {
                    line.push(b' ');
                    line.extend_from_slice(&err.message);
                }
                Token::SimpleError(&line).put(buf)
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(msg) => write!(f, "{}", msg),
            Reply::Integer(num) => write!(f, "(integer) {}", num),
            Reply::Bulk(Some(msg)) => write!(f, "{:?}", msg),
            Reply::Bulk(None) | Reply::Array(None) => f.write_str("(nil)"),
            Reply::Array(Some(elems)) if elems.is_empty() => f.write_str("(empty array)"),
            Reply::Array(Some(elems)) => {
                for (idx, elem) in elems.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}) {}", idx + 1, elem)?;
                }
                Ok(())
            }
            Reply::Error(err) => write!(f, "(error) {}", err),
        }
    }
}

fn spaced(message: &BString) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" {}", message)
    }
}

impl From<ServerError> for Reply {
    fn from(err: ServerError) -> Self {
        Reply::Error(err)
    }
}

impl<'a> Message<'a> {
    /// Build an owned reply tree from this message.
    pub fn to_reply(&self) -> Reply {
        let mut tokens = self.clone().into_iter();
        // Message never be empty and its arrays are always complete
        build(&mut tokens).unwrap()
    }
}

fn build<'a>(tokens: &mut impl Iterator<Item = Token<'a>>) -> Option<Reply> {
    Some(match tokens.next()? {
        Token::Simple(msg) => Reply::Status(msg.into()),
        Token::SimpleError(msg) => Reply::Error(ServerError::parse(msg)),
        Token::Integer(num) => Reply::Integer(num),
        Token::Bulk(msg) => Reply::Bulk(msg.map(BString::from)),
        Token::Array(None) => Reply::Array(None),
        Token::Array(Some(len)) => {
            let mut elems = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                elems.push(build(tokens)?);
            }
            Reply::Array(Some(elems))
        }
    })
}
