//! Parse and write RESP2 tokens.

use std::num::NonZeroUsize;

use bytes::{Buf, BufMut};
use memchr::memmem::Finder;
use once_cell::sync::Lazy;

use super::parse_str;

/// RESP2 token
///
/// <https://redis.io/docs/reference/protocol-spec/>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token<'a> {
    /// `*2\r\n` or `*-1\r\n`
    ///
    /// Array header. `None` is the nil array, which has no elements
    /// and is distinct from the empty array `*0\r\n`.
    Array(Option<usize>),
    /// `$5\r\nhello\r\n` or `$-1\r\n`
    ///
    /// Binary safe bulk string. `None` is the nil bulk string.
    Bulk(Option<&'a [u8]>),
    /// `+OK\r\n`
    ///
    /// Status line.
    Simple(&'a [u8]),
    /// `-ERR unknown command\r\n`
    ///
    /// Error line sent by the server.
    SimpleError(&'a [u8]),
    /// `:42\r\n`
    Integer(i64),
}

use Token::*;

/// Top level value which flows over the connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Message<'a> {
    buf: &'a [u8],
    tokens: usize,
}

/// Iterate tokens within a message.
#[derive(Debug, Clone)]
pub struct MessageIter<'a> {
    msg: Message<'a>,
}

/// Reader accepts bytes from the transport and returns one complete message when available.
///
/// Bytes following the message stay in the buffer until the message is consumed,
/// so pipelined replies can be read back to back.
///
/// ```
/// # use pipedis::resp2::token::{Reader, Error};
/// # use bytes::BufMut;
/// let mut reader = Reader::new();
/// reader.buf().put_slice(b"$12\r\nHello w");
/// assert_eq!(None, reader.read()?);
/// reader.buf().put_slice(b"orld!\r\n*2\r");
/// assert_eq!(b"$12\r\nHello world!\r\n", reader.read()?.unwrap().as_ref());
/// reader.buf().put_slice(b"\n:1\r\n:2\r\n-wh");
/// assert_eq!(b"$12\r\nHello world!\r\n", reader.read()?.unwrap().as_ref());
/// reader.consume();
/// assert_eq!(b"*2\r\n:1\r\n:2\r\n", reader.read()?.unwrap().as_ref());
/// reader.consume();
/// assert_eq!(None, reader.read()?);
/// # Ok::<_, Error>(())
/// ```
#[derive(Debug)]
pub struct Reader {
    buf: Vec<u8>,
    parsed_offset: usize,
    parsed_tokens: usize,
    stack: Vec<Frame>,
}

/// Array which still expects `remaining` elements.
#[derive(Debug, Clone, Copy)]
struct Frame {
    remaining: NonZeroUsize,
    depth: usize,
}

/// Errors that occur when parsing the RESP2 protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid prefix byte.
    #[error("invalid prefix byte: {0:#04x}")]
    InvalidPrefix(u8),
    /// Expected `\r\n` bytes, but found something else.
    #[error("expected \\r\\n bytes, but found something else")]
    ExpectedCrlf,
    /// Failed to parse integer.
    #[error("failed to parse integer")]
    ParseIntFailed,
    /// Negative length other than the `-1` nil marker.
    #[error("invalid length: {0}")]
    InvalidLength(i64),
    /// Declared length is larger than the parser accepts.
    #[error("declared length {len} exceeds {max}")]
    TooLarge { len: usize, max: usize },
    /// A status, error or header line has no terminator within the accepted line length.
    #[error("line exceeds {0} bytes without \\r\\n")]
    LineTooLong(usize),
    /// Arrays are nested deeper than the parser accepts.
    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Upper bound of bulk string lengths and array counts.
///
/// Matches the server's default `proto-max-bulk-len`.
pub const MAX_DECLARED_LEN: usize = 512 * 1024 * 1024;

/// Upper bound of a single line, excluding bulk payloads.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Upper bound of array nesting.
///
/// Replies are built and deserialized recursively, one stack frame per level.
pub const MAX_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";
const NIL: &[u8] = b"-1";

const ARRAY: u8 = b'*';
const BULK: u8 = b'$';
const SIMPLE: u8 = b'+';
const ERROR: u8 = b'-';
const INTEGER: u8 = b':';

const ONE: NonZeroUsize = match NonZeroUsize::new(1) {
    Some(one) => one,
    None => panic!("surprisingly, 1 is zero"),
};

impl Frame {
    /// Expects one top level message.
    const TOP: Frame = Frame {
        remaining: ONE,
        depth: 0,
    };
}

impl<'a> Token<'a> {
    /// Write a token to the buffer.
    pub fn put<T: BufMut>(&self, buf: &mut T) {
        fn header<T: BufMut>(buf: &mut T, tag: u8, len: Option<usize>) {
            buf.put_u8(tag);
            match len {
                Some(len) => {
                    let mut nbuf = itoa::Buffer::new();
                    buf.put_slice(nbuf.format(len).as_bytes());
                }
                None => buf.put_slice(NIL),
            }
            buf.put_slice(CRLF);
        }
        match self {
            Array(len) => header(buf, ARRAY, *len),
            Bulk(msg) => {
                header(buf, BULK, msg.map(<[u8]>::len));
                if let Some(msg) = msg {
                    buf.put_slice(msg);
                    buf.put_slice(CRLF);
                }
            }
            Simple(msg) => {
                debug_assert!(
                    msg.iter().all(|&b| b != b'\r' && b != b'\n'),
                    "RESP Simple String can't have \\r or \\n character"
                );
                buf.put_u8(SIMPLE);
                buf.put_slice(msg);
                buf.put_slice(CRLF);
            }
            SimpleError(msg) => {
                debug_assert!(
                    msg.iter().all(|&b| b != b'\r' && b != b'\n'),
                    "RESP Error can't have \\r or \\n character"
                );
                buf.put_u8(ERROR);
                buf.put_slice(msg);
                buf.put_slice(CRLF);
            }
            Integer(num) => {
                let mut nbuf = itoa::Buffer::new();
                buf.put_u8(INTEGER);
                buf.put_slice(nbuf.format(*num).as_bytes());
                buf.put_slice(CRLF);
            }
        }
    }

    /// Process the stack of open arrays with self token.
    /// Start with the stack with `vec![Frame::TOP]`
    /// and keep call this function with new tokens
    /// until the stack being emptied.
    ///
    /// Fails without touching the stack if the token would open
    /// an array nested deeper than [`MAX_DEPTH`].
    fn process_stack(&self, stack: &mut Vec<Frame>) -> Result<(), Error> {
        let depth = stack.last().map_or(0, |frame| frame.depth);
        let opens = match self {
            Array(Some(len)) => NonZeroUsize::new(*len),
            _ => None,
        };
        if opens.is_some() && depth >= MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }

        // every token fills one slot of the innermost array
        if let Some(frame) = stack.pop() {
            if let Some(remaining) = NonZeroUsize::new(frame.remaining.get() - 1) {
                stack.push(Frame { remaining, ..frame });
            }
        }

        if let Some(remaining) = opens {
            stack.push(Frame {
                remaining,
                depth: depth + 1,
            });
        }

        Ok(())
    }
}

impl<'a> IntoIterator for Message<'a> {
    type Item = Token<'a>;
    type IntoIter = MessageIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        MessageIter { msg: self }
    }
}

impl<'a> AsRef<[u8]> for Message<'a> {
    fn as_ref(&self) -> &[u8] {
        self.buf
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.msg.tokens == 0 {
            debug_assert!(self.msg.buf.is_empty());
            None
        } else {
            self.msg.tokens -= 1;
            // the Reader validated every token of the message already
            Some(next_token(&mut self.msg.buf).unwrap())
        }
    }
}

impl Reader {
    /// Constructs a new `Reader`.
    pub fn new() -> Self {
        Reader {
            buf: vec![],
            parsed_offset: 0,
            parsed_tokens: 0,
            stack: vec![Frame::TOP], // to parse 1 msg on start
        }
    }

    /// Get the buffer to feed incoming bytes.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Amount of bytes received but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns message view stored within the internal buffer on success.
    /// Returns `Ok(None)` if more bytes needed to parse.
    /// To get next message after this call, you need to call `.consume()`
    /// otherwise the same message would be returned again.
    pub fn read(&mut self) -> Result<Option<Message<'_>>, Error> {
        while !self.stack.is_empty() {
            let mut buf = &self.buf[self.parsed_offset..];
            let token = match next_token(&mut buf) {
                Ok(tok) => tok,
                Err(None) => return Ok(None),
                Err(Some(err)) => return Err(err),
            };
            token.process_stack(&mut self.stack)?;

            self.parsed_tokens += 1;
            self.parsed_offset = self.buf.len() - buf.len();
        }

        Ok(self.peek())
    }

    /// Peek a message stored within the `Reader` without modifying internal state.
    pub fn peek(&self) -> Option<Message<'_>> {
        self.stack.is_empty().then(|| {
            debug_assert!(self.parsed_tokens > 0, "Message should never be empty");
            Message {
                buf: &self.buf[..self.parsed_offset],
                tokens: self.parsed_tokens,
            }
        })
    }

    /// Consume currently parsed message.
    pub fn consume(&mut self) {
        if self.stack.is_empty() {
            self.buf.drain(..self.parsed_offset);
            self.parsed_tokens = 0;
            self.parsed_offset = 0;
            self.stack.push(Frame::TOP); // to parse 1 msg next time
        }
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single token from the front of the `buf`.
///
/// `Err(None)` means more bytes are needed. The `buf` is only advanced on success.
pub(crate) fn next_token<'a>(buf: &mut &'a [u8]) -> Result<Token<'a>, Option<Error>> {
    fn until_crlf<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], Option<Error>> {
        static CRLF_SEARCH: Lazy<Finder> = Lazy::new(|| Finder::new(CRLF));

        let idx = match CRLF_SEARCH.find(buf) {
            Some(idx) => idx,
            None if buf.len() > MAX_LINE_LEN => return Err(Error::LineTooLong(MAX_LINE_LEN).into()),
            None => return Err(None),
        };
        let res = &buf[..idx];
        buf.advance(idx + CRLF.len());

        Ok(res)
    }

    fn until_len_crlf<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], Option<Error>> {
        if buf.len() < len + CRLF.len() {
            return Err(None);
        }
        let (msg_crlf, remains) = buf.split_at(len + CRLF.len());
        let (msg, crlf) = msg_crlf.split_at(len);
        if crlf != CRLF {
            return Err(Error::ExpectedCrlf.into());
        }
        *buf = remains;
        Ok(msg)
    }

    fn parse_opt_len(buf: &mut &[u8]) -> Result<Option<usize>, Option<Error>> {
        let msg = until_crlf(buf)?;
        if msg == NIL {
            return Ok(None);
        }
        let len: i64 = parse_str(msg).ok_or(Error::ParseIntFailed)?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidLength(len))?;
        if len > MAX_DECLARED_LEN {
            return Err(Error::TooLarge {
                len,
                max: MAX_DECLARED_LEN,
            }
            .into());
        }
        Ok(Some(len))
    }

    // work on a copy so that incomplete input leaves the caller's slice untouched
    let mut cursor = *buf;
    if cursor.is_empty() {
        return Err(None);
    }

    let token = match cursor.get_u8() {
        ARRAY => Array(parse_opt_len(&mut cursor)?),
        BULK => Bulk(
            parse_opt_len(&mut cursor)?
                .map(|len| until_len_crlf(&mut cursor, len))
                .transpose()?,
        ),
        SIMPLE => Simple(until_crlf(&mut cursor)?),
        ERROR => SimpleError(until_crlf(&mut cursor)?),
        INTEGER => Integer({
            let msg = until_crlf(&mut cursor)?;
            parse_str(msg).ok_or(Error::ParseIntFailed)?
        }),
        other => return Err(Error::InvalidPrefix(other).into()),
    };

    *buf = cursor;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(mut input: &[u8]) -> Result<(Token<'_>, usize), Option<Error>> {
        let total = input.len();
        let tok = next_token(&mut input)?;
        Ok((tok, total - input.len()))
    }

    #[test]
    fn scalar_tokens() {
        assert_eq!(Ok((Simple(b"OK"), 5)), parse(b"+OK\r\n"));
        assert_eq!(Ok((SimpleError(b"ERR bad"), 10)), parse(b"-ERR bad\r\n"));
        assert_eq!(Ok((Integer(-42), 6)), parse(b":-42\r\n"));
        assert_eq!(Ok((Bulk(Some(b"hi")), 8)), parse(b"$2\r\nhi\r\n"));
    }

    #[test]
    fn nil_is_not_empty() {
        assert_eq!(Ok((Bulk(None), 5)), parse(b"$-1\r\n"));
        assert_eq!(Ok((Bulk(Some(b"")), 6)), parse(b"$0\r\n\r\n"));
        assert_eq!(Ok((Array(None), 5)), parse(b"*-1\r\n"));
        assert_eq!(Ok((Array(Some(0)), 4)), parse(b"*0\r\n"));
    }

    #[test]
    fn bulk_is_binary_safe() {
        assert_eq!(
            Ok((Bulk(Some(b"a\r\n\0b")), 11)),
            parse(b"$5\r\na\r\n\0b\r\n")
        );
    }

    #[test]
    fn incomplete() {
        assert_eq!(Err(None), parse(b""));
        assert_eq!(Err(None), parse(b"+OK\r"));
        assert_eq!(Err(None), parse(b"$5\r\nhel"));
        assert_eq!(Err(None), parse(b"$5\r\nhello\r"));
    }

    #[test]
    fn malformed() {
        assert_eq!(Err(Some(Error::InvalidPrefix(b'?'))), parse(b"?\r\n"));
        assert_eq!(Err(Some(Error::ParseIntFailed)), parse(b":abc\r\n"));
        assert_eq!(Err(Some(Error::ExpectedCrlf)), parse(b"$2\r\nhiXX"));
        assert_eq!(Err(Some(Error::InvalidLength(-2))), parse(b"$-2\r\n"));
        assert_eq!(
            Err(Some(Error::TooLarge {
                len: MAX_DECLARED_LEN + 1,
                max: MAX_DECLARED_LEN
            })),
            parse(format!("*{}\r\n", MAX_DECLARED_LEN + 1).as_bytes())
        );
        let long = vec![b'+'; MAX_LINE_LEN + 2];
        assert_eq!(Err(Some(Error::LineTooLong(MAX_LINE_LEN))), parse(&long));
    }

    #[test]
    fn reader_stops_at_message_boundary() {
        let mut reader = Reader::new();
        reader.buf().put_slice(b"*2\r\n$1\r\na\r\n*-1\r\n:7\r\n");
        assert_eq!(b"*2\r\n$1\r\na\r\n*-1\r\n", reader.read().unwrap().unwrap().as_ref());
        reader.consume();
        assert_eq!(4, reader.buffered());
        assert_eq!(b":7\r\n", reader.read().unwrap().unwrap().as_ref());
        reader.consume();
        assert_eq!(0, reader.buffered());
        assert_eq!(None, reader.read().unwrap());
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut reader = Reader::new();
        reader.buf().put_slice("*1\r\n".repeat(MAX_DEPTH).as_bytes());
        reader.buf().put_slice(b":1\r\n");
        assert_eq!(MAX_DEPTH + 1, reader.read().unwrap().unwrap().into_iter().count());
        reader.consume();

        reader.buf().put_slice("*1\r\n".repeat(MAX_DEPTH + 1).as_bytes());
        reader.buf().put_slice(b":1\r\n");
        assert_eq!(Err(Error::TooDeep(MAX_DEPTH)), reader.read());
        // the offending header is left unparsed
        assert_eq!(Err(Error::TooDeep(MAX_DEPTH)), reader.read());
    }

    #[test]
    fn deep_input_fails_before_it_is_complete() {
        let mut reader = Reader::new();
        reader.buf().put_slice("*2\r\n".repeat(100_000).as_bytes());
        assert_eq!(Err(Error::TooDeep(MAX_DEPTH)), reader.read());
    }

    #[test]
    fn trailing_arrays_still_nest() {
        let mut reader = Reader::new();
        reader.buf().put_slice("*2\r\n*0\r\n".repeat(MAX_DEPTH * 4).as_bytes());
        reader.buf().put_slice(b"*0\r\n");
        assert_eq!(Err(Error::TooDeep(MAX_DEPTH)), reader.read());
    }

    #[test]
    fn put_writes_wire_format() {
        let mut buf = vec![];
        Array(Some(2)).put(&mut buf);
        Bulk(Some(b"GET")).put(&mut buf);
        Bulk(None).put(&mut buf);
        Array(None).put(&mut buf);
        Integer(-3).put(&mut buf);
        Simple(b"OK").put(&mut buf);
        SimpleError(b"ERR x").put(&mut buf);
        assert_eq!(
            &b"*2\r\n$3\r\nGET\r\n$-1\r\n*-1\r\n:-3\r\n+OK\r\n-ERR x\r\n"[..],
            &buf[..]
        );
    }
}
