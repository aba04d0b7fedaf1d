//! String commands.

use bstr::BString;

use super::{arg, int_arg, interpret, Command};
use crate::resp2::de;

/// <https://redis.io/commands/get>
pub fn get(key: impl AsRef<[u8]>) -> Command<Option<BString>> {
    Command::build("GET", vec![arg(key)], interpret::nullable_bulk)
}

/// <https://redis.io/commands/set>
pub fn set(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Command<()> {
    Command::build("SET", vec![arg(key), arg(value)], interpret::ok)
}

/// `SET key value EX seconds`
pub fn set_ex(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>, seconds: u64) -> Command<()> {
    let mut buf = itoa::Buffer::new();
    Command::build(
        "SET",
        vec![arg(key), arg(value), arg("EX"), arg(buf.format(seconds))],
        interpret::ok,
    )
}

/// <https://redis.io/commands/append>
///
/// Returns the length of the string after the append.
pub fn append(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Command<i64> {
    Command::build("APPEND", vec![arg(key), arg(value)], interpret::integer)
}

/// <https://redis.io/commands/incr>
pub fn incr(key: impl AsRef<[u8]>) -> Command<i64> {
    Command::build("INCR", vec![arg(key)], interpret::integer)
}

/// <https://redis.io/commands/incrby>
pub fn incrby(key: impl AsRef<[u8]>, increment: i64) -> Command<i64> {
    Command::build("INCRBY", vec![arg(key), int_arg(increment)], interpret::integer)
}

/// <https://redis.io/commands/decr>
pub fn decr(key: impl AsRef<[u8]>) -> Command<i64> {
    Command::build("DECR", vec![arg(key)], interpret::integer)
}

/// <https://redis.io/commands/decrby>
pub fn decrby(key: impl AsRef<[u8]>, decrement: i64) -> Command<i64> {
    Command::build("DECRBY", vec![arg(key), int_arg(decrement)], interpret::integer)
}

/// <https://redis.io/commands/mget>
///
/// Missing keys are `None`, in the position of the key.
pub fn mget<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>) -> Command<Vec<Option<BString>>> {
    Command::build("MGET", keys.into_iter().map(arg).collect(), de::from_reply)
}
