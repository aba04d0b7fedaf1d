//! Errors of the client.

use std::io;

use bstr::BString;

use crate::resp2::{de, ser_cmd, token, ServerError};

/// Error returned by the [`Client`](crate::Client) and the [`Session`](crate::connection::Session).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server sent something which doesn't follow the protocol.
    /// The session can't be used after it.
    #[error("protocol error")]
    Protocol(#[from] ProtocolError),
    /// The reply doesn't have the shape the command expects.
    /// The session is still usable.
    #[error(transparent)]
    Shape(#[from] ShapeError),
    /// Error reply from the server.
    #[error("server error: {0}")]
    Server(#[from] ServerError),
    /// Transport deadline exceeded.
    #[error("timed out")]
    Timeout,
    /// Transport failure.
    #[error("io error")]
    Io(#[from] io::Error),
    /// A previous failure left the session in an unknown state.
    /// Call [`Client::close()`](crate::Client::close) to connect again.
    #[error("session is broken by a previous failure")]
    SessionBroken,
    /// A pipeline is already being captured.
    #[error("already capturing a pipeline")]
    AlreadyCapturing,
    /// The request can't be serialized into arguments.
    #[error("serialize error")]
    Serialize(#[from] ser_cmd::Error),
}

/// Violation of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed reply")]
    Malformed(#[from] token::Error),
    #[error("connection closed after {received} of {expected} replies")]
    Truncated { received: usize, expected: usize },
    #[error("expected {expected} replies, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Reply type mismatch, with the command it was sent for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unexpected reply for {command}{}", .position.map(|pos| format!(" at pipeline position {}", pos)).unwrap_or_default())]
pub struct ShapeError {
    /// Name of the command.
    pub command: BString,
    /// Position within the pipeline, if the command was pipelined.
    pub position: Option<usize>,
    #[source]
    pub source: de::Error,
}

impl Error {
    /// Returns the server error if this is one.
    pub fn server(&self) -> Option<&ServerError> {
        match self {
            Error::Server(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if the session can't be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::Timeout | Error::Io(_) | Error::SessionBroken
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_error_message() {
        let err = ShapeError {
            command: "GET".into(),
            position: Some(2),
            source: de::Error::ParseIntFailed,
        };
        assert_eq!(
            "unexpected reply for GET at pipeline position 2",
            err.to_string()
        );

        let err = ShapeError { position: None, ..err };
        assert_eq!("unexpected reply for GET", err.to_string());
    }

    #[test]
    fn fatality() {
        assert!(Error::Timeout.is_fatal());
        assert!(!Error::AlreadyCapturing.is_fatal());

        let err = Error::Server(ServerError::new("ERR", "bad state"));
        assert_eq!("bad state", err.server().unwrap().message());
        assert!(!err.is_fatal());
    }
}
