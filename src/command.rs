//! Typed commands.
//!
//! A [`Command<T>`](Command) is a command name, its ordered arguments and the
//! interpreter which turns the reply into a `T`.
//! Commands can be built from any serializable sequence with [`Command::new()`],
//! or taken from the catalogue modules below.

use std::fmt;

use bstr::{BStr, ByteSlice};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::resp2::{de, ser_cmd, Reply};

pub mod connection;
pub mod hash;
pub mod interpret;
pub mod keys;
pub mod strings;

/// Interprets a non-error reply into the command's result type.
pub type Interpreter<T> = fn(Reply) -> Result<T, de::Error>;

/// A command to be sent, with its expected reply type.
///
/// The interpreter never sees a [`Reply::Error`](Reply::Error),
/// server errors are handled before it according to the client's error policy.
pub struct Command<T> {
    name: Bytes,
    args: Vec<Bytes>,
    interpret: Interpreter<T>,
}

impl<T: DeserializeOwned> Command<T> {
    /// Build a command from a serializable sequence, command name first.
    ///
    /// The reply is read with the serde [`Deserializer`](crate::resp2::de::Deserializer).
    /// See [`ser_cmd`](crate::resp2::ser_cmd) for how the request is flattened into arguments.
    ///
    /// ```
    /// # use pipedis::command::Command;
    /// let cmd: Command<Vec<Option<String>>> = Command::new(&("MGET", ["a", "b"]))?;
    /// assert_eq!("MGET", cmd.name());
    /// assert_eq!(2, cmd.args().len());
    /// # Ok::<_, pipedis::resp2::ser_cmd::Error>(())
    /// ```
    pub fn new<Req: Serialize + ?Sized>(request: &Req) -> Result<Self, ser_cmd::Error> {
        let mut args = ser_cmd::to_args(request)?;
        let name = args.remove(0);
        Ok(Command {
            name,
            args,
            interpret: de::from_reply::<T>,
        })
    }
}

impl Command<Reply> {
    /// Build a command which returns the reply as is.
    pub fn raw<Req: Serialize + ?Sized>(request: &Req) -> Result<Self, ser_cmd::Error> {
        let mut args = ser_cmd::to_args(request)?;
        let name = args.remove(0);
        Ok(Command {
            name,
            args,
            interpret: interpret::raw,
        })
    }
}

impl<T> Command<T> {
    pub(crate) fn build(name: &'static str, args: Vec<Bytes>, interpret: Interpreter<T>) -> Self {
        Command {
            name: Bytes::from_static(name.as_bytes()),
            args,
            interpret,
        }
    }

    /// Replace the interpreter, changing the result type.
    pub fn with_interpreter<U>(self, interpret: Interpreter<U>) -> Command<U> {
        Command {
            name: self.name,
            args: self.args,
            interpret,
        }
    }

    /// Command name like `GET`.
    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Run the interpreter on the reply.
    pub fn interpret(&self, reply: Reply) -> Result<T, de::Error> {
        (self.interpret)(reply)
    }

    pub(crate) fn into_parts(self) -> (Bytes, Vec<Bytes>, Interpreter<T>) {
        (self.name, self.args, self.interpret)
    }
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Command {
            name: self.name.clone(),
            args: self.args.clone(),
            interpret: self.interpret,
        }
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name())
            .field("args", &self.args.iter().map(|arg| arg.as_bstr()).collect::<Vec<_>>())
            .finish()
    }
}

fn arg(value: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(value.as_ref())
}

fn int_arg(value: i64) -> Bytes {
    arg(itoa::Buffer::new().format(value))
}
