//! Hash commands.

use bstr::{BString, ByteSlice};
use indexmap::IndexMap;
use serde::Serialize;

use super::{arg, int_arg, interpret, Command};
use crate::resp2::ser_cmd;

/// <https://redis.io/commands/hset>
///
/// Returns the number of fields that were added.
pub fn hset(
    key: impl AsRef<[u8]>,
    field: impl AsRef<[u8]>,
    value: impl AsRef<[u8]>,
) -> Command<i64> {
    Command::build(
        "HSET",
        vec![arg(key), arg(field), arg(value)],
        interpret::integer,
    )
}

/// `HSET` with every field of a struct or map.
///
/// ```
/// # use pipedis::command::hash::hset_multiple;
/// #[derive(serde::Serialize)]
/// struct User {
///     name: &'static str,
///     age: u32,
/// }
/// let cmd = hset_multiple("user:1", &User { name: "kim", age: 7 })?;
/// assert_eq!(vec!["user:1", "name", "kim", "age", "7"], cmd.args());
/// # Ok::<_, pipedis::resp2::ser_cmd::Error>(())
/// ```
pub fn hset_multiple<F: Serialize + ?Sized>(
    key: impl AsRef<[u8]>,
    fields: &F,
) -> Result<Command<i64>, ser_cmd::Error> {
    Ok(Command::<i64>::new(&("HSET", key.as_ref().as_bstr(), fields))?
        .with_interpreter(interpret::integer))
}

/// <https://redis.io/commands/hget>
pub fn hget(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Command<Option<BString>> {
    Command::build("HGET", vec![arg(key), arg(field)], interpret::nullable_bulk)
}

/// <https://redis.io/commands/hgetall>
///
/// Fields keep the order the server sent them.
pub fn hgetall(key: impl AsRef<[u8]>) -> Command<IndexMap<BString, BString>> {
    Command::build("HGETALL", vec![arg(key)], interpret::pairs)
}

/// <https://redis.io/commands/hdel>
pub fn hdel<F: AsRef<[u8]>>(
    key: impl AsRef<[u8]>,
    fields: impl IntoIterator<Item = F>,
) -> Command<i64> {
    let args = std::iter::once(arg(key))
        .chain(fields.into_iter().map(arg))
        .collect();
    Command::build("HDEL", args, interpret::integer)
}

/// <https://redis.io/commands/hincrby>
pub fn hincrby(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>, increment: i64) -> Command<i64> {
    Command::build(
        "HINCRBY",
        vec![arg(key), arg(field), int_arg(increment)],
        interpret::integer,
    )
}
