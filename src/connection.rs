//! Protocol session over a single transport stream.
//!
//! For more information, see the [`Session`](Session) type.

use std::marker::Unpin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::error::{Error, ProtocolError};
use crate::resp2::{Reader, Reply};

/// A request/response session over one stream.
///
/// Requests are issued strictly one after another.
/// Any transport, timeout or protocol failure breaks the session,
/// and every later request fails with [`Error::SessionBroken`] without touching the stream.
/// A request future dropped before its replies are read breaks the session too.
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
    reader: Reader,
    timeout: Duration,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    InFlight,
    Broken,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Constructs a `Session` which applies the `timeout` to each write and read.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Session {
            stream,
            reader: Reader::new(),
            timeout,
            state: State::Ready,
        }
    }

    /// Returns `true` if a previous failure broke this session.
    pub fn is_broken(&self) -> bool {
        self.state != State::Ready
    }

    /// Write the whole frame and read `expected` replies, in order.
    pub async fn send(&mut self, frame: &[u8], expected: usize) -> Result<Vec<Reply>, Error> {
        if self.state != State::Ready {
            return Err(Error::SessionBroken);
        }

        self.state = State::InFlight;
        let res = self.round_trip(frame, expected).await;
        self.state = match &res {
            Ok(_) => State::Ready,
            Err(err) => {
                warn!(error = %err, "session broken");
                State::Broken
            }
        };

        res
    }

    async fn round_trip(&mut self, frame: &[u8], expected: usize) -> Result<Vec<Reply>, Error> {
        trace!(bytes = frame.len(), expected, "write frame");
        let stream = &mut self.stream;
        timeout(self.timeout, async move {
            stream.write_all(frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout)??;

        let mut replies = Vec::with_capacity(expected.min(1024));
        while replies.len() < expected {
            let reply = self
                .reader
                .read()
                .map_err(ProtocolError::Malformed)?
                .map(|msg| msg.to_reply());
            if let Some(reply) = reply {
                self.reader.consume();
                replies.push(reply);
                continue;
            }

            let read = timeout(self.timeout, self.stream.read_buf(self.reader.buf()))
                .await
                .map_err(|_| Error::Timeout)??;
            if read == 0 {
                return Err(ProtocolError::Truncated {
                    received: replies.len(),
                    expected,
                }
                .into());
            }
            trace!(bytes = read, "read");
        }

        Ok(replies)
    }

    /// Take the stream back, dropping any buffered bytes.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
