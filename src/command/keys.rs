//! Generic key commands.

use bstr::BString;

use super::{arg, int_arg, interpret, Command};

/// <https://redis.io/commands/del>
///
/// Returns the number of keys that were removed.
pub fn del<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>) -> Command<i64> {
    Command::build("DEL", keys.into_iter().map(arg).collect(), interpret::integer)
}

/// <https://redis.io/commands/exists>
///
/// Keys mentioned multiple times are counted multiple times.
pub fn exists<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>) -> Command<i64> {
    Command::build(
        "EXISTS",
        keys.into_iter().map(arg).collect(),
        interpret::integer,
    )
}

/// <https://redis.io/commands/expire>
///
/// Returns `false` if the key doesn't exist.
pub fn expire(key: impl AsRef<[u8]>, seconds: i64) -> Command<bool> {
    Command::build("EXPIRE", vec![arg(key), int_arg(seconds)], interpret::boolean)
}

/// <https://redis.io/commands/ttl>
///
/// `-2` if the key doesn't exist, `-1` if it has no expiry.
pub fn ttl(key: impl AsRef<[u8]>) -> Command<i64> {
    Command::build("TTL", vec![arg(key)], interpret::integer)
}

/// <https://redis.io/commands/type>
pub fn key_type(key: impl AsRef<[u8]>) -> Command<BString> {
    Command::build("TYPE", vec![arg(key)], crate::resp2::de::from_reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp2::Reply;

    #[test]
    fn variadic_keys() {
        let cmd = del(["a", "b", "c"]);
        assert_eq!("DEL", cmd.name());
        assert_eq!(vec!["a", "b", "c"], cmd.args());

        let cmd = exists(vec![String::from("a")]);
        assert_eq!(vec!["a"], cmd.args());
    }

    #[test]
    fn expire_reply() {
        let cmd = expire("k", 100);
        assert_eq!(vec!["k", "100"], cmd.args());
        assert_eq!(Ok(false), cmd.interpret(Reply::Integer(0)));
        assert_eq!(Ok(BString::from("hash")), key_type("k").interpret(Reply::Status("hash".into())));
    }
}
