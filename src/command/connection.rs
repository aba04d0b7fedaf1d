//! Connection commands.

use bstr::BString;

use super::{arg, Command};
use crate::resp2::de;

/// <https://redis.io/commands/ping>
///
/// The server answers with the `PONG` status.
pub fn ping() -> Command<BString> {
    Command::build("PING", vec![], de::from_reply)
}

/// <https://redis.io/commands/echo>
pub fn echo(message: impl AsRef<[u8]>) -> Command<BString> {
    Command::build("ECHO", vec![arg(message)], de::from_reply)
}
