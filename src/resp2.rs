//! RESP2 wire codec.
//!
//! Commands are written as arrays of bulk strings, replies are read
//! one complete message at a time with the [`Reader`](token::Reader).

use bytes::{BufMut, Bytes};

pub mod de;
pub mod reply;
pub mod ser_cmd;
pub mod token;

pub use reply::{Reply, ServerError};
pub use token::Reader;

use crate::command::Command;
use token::Token;

/// Encode the command into its wire frame.
///
/// ```
/// # use pipedis::{command::strings, resp2::encode};
/// let frame = encode(&strings::set("key", "value"));
/// assert_eq!(&b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"[..], &frame[..]);
/// ```
pub fn encode<T>(command: &Command<T>) -> Vec<u8> {
    let mut buf = Vec::new();
    put_command(&mut buf, command.name(), command.args());
    buf
}

/// Encode every command back to back, in order.
pub fn encode_batch<T>(commands: &[Command<T>]) -> Vec<u8> {
    let mut buf = Vec::new();
    for command in commands {
        put_command(&mut buf, command.name(), command.args());
    }
    buf
}

/// Decode a single reply from the front of the `buf`.
///
/// Returns the reply with the amount of bytes it took, or `Ok(None)` if the `buf`
/// doesn't hold a complete reply yet. Trailing bytes are left for the next call.
///
/// ```
/// # use pipedis::resp2::{decode_one, Reply};
/// let buf = b"+OK\r\n:3\r\n";
/// let (first, used) = decode_one(buf)?.unwrap();
/// assert_eq!((Reply::ok(), 5), (first, used));
/// let (second, _) = decode_one(&buf[used..])?.unwrap();
/// assert_eq!(Reply::Integer(3), second);
/// # Ok::<_, pipedis::resp2::token::Error>(())
/// ```
pub fn decode_one(buf: &[u8]) -> Result<Option<(Reply, usize)>, token::Error> {
    let mut reader = Reader::new();
    reader.buf().extend_from_slice(buf);
    let decoded = reader
        .read()?
        .map(|msg| (msg.to_reply(), msg.as_ref().len()));
    Ok(decoded)
}

pub(crate) fn put_command<B: BufMut>(buf: &mut B, name: &[u8], args: &[Bytes]) {
    Token::Array(Some(1 + args.len())).put(buf);
    Token::Bulk(Some(name)).put(buf);
    for arg in args {
        Token::Bulk(Some(&arg[..])).put(buf);
    }
}

fn parse_str<T: std::str::FromStr>(msg: &[u8]) -> Option<T> {
    std::str::from_utf8(msg).ok()?.parse().ok()
}
