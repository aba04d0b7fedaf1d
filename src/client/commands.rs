use bstr::BString;
use indexmap::IndexMap;
use serde::Serialize;

use crate::command::{connection, hash, keys, strings};
use crate::connector::Connector;

use super::{Client, Error, Response};

impl<C: Connector> Client<C> {
    /// <https://redis.io/commands/ping>
    pub async fn ping(&mut self) -> Result<Response<BString>, Error> {
        self.execute(connection::ping()).await
    }

    /// <https://redis.io/commands/echo>
    pub async fn echo(&mut self, message: impl AsRef<[u8]>) -> Result<Response<BString>, Error> {
        self.execute(connection::echo(message)).await
    }

    /// <https://redis.io/commands/get>
    pub async fn get(&mut self, key: impl AsRef<[u8]>) -> Result<Response<Option<BString>>, Error> {
        self.execute(strings::get(key)).await
    }

    /// <https://redis.io/commands/set>
    pub async fn set(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<Response<()>, Error> {
        self.execute(strings::set(key, value)).await
    }

    /// `SET key value EX seconds`
    pub async fn set_ex(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        seconds: u64,
    ) -> Result<Response<()>, Error> {
        self.execute(strings::set_ex(key, value, seconds)).await
    }

    /// <https://redis.io/commands/append>
    pub async fn append(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<Response<i64>, Error> {
        self.execute(strings::append(key, value)).await
    }

    /// <https://redis.io/commands/incr>
    pub async fn incr(&mut self, key: impl AsRef<[u8]>) -> Result<Response<i64>, Error> {
        self.execute(strings::incr(key)).await
    }

    /// <https://redis.io/commands/incrby>
    pub async fn incrby(
        &mut self,
        key: impl AsRef<[u8]>,
        increment: i64,
    ) -> Result<Response<i64>, Error> {
        self.execute(strings::incrby(key, increment)).await
    }

    /// <https://redis.io/commands/decr>
    pub async fn decr(&mut self, key: impl AsRef<[u8]>) -> Result<Response<i64>, Error> {
        self.execute(strings::decr(key)).await
    }

    /// <https://redis.io/commands/decrby>
    pub async fn decrby(
        &mut self,
        key: impl AsRef<[u8]>,
        decrement: i64,
    ) -> Result<Response<i64>, Error> {
        self.execute(strings::decrby(key, decrement)).await
    }

    /// <https://redis.io/commands/mget>
    pub async fn mget<K: AsRef<[u8]>>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Response<Vec<Option<BString>>>, Error> {
        self.execute(strings::mget(keys)).await
    }

    /// <https://redis.io/commands/del>
    pub async fn del<K: AsRef<[u8]>>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Response<i64>, Error> {
        self.execute(keys::del(keys)).await
    }

    /// <https://redis.io/commands/exists>
    pub async fn exists<K: AsRef<[u8]>>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Response<i64>, Error> {
        self.execute(keys::exists(keys)).await
    }

    /// <https://redis.io/commands/expire>
    pub async fn expire(
        &mut self,
        key: impl AsRef<[u8]>,
        seconds: i64,
    ) -> Result<Response<bool>, Error> {
        self.execute(keys::expire(key, seconds)).await
    }

    /// <https://redis.io/commands/ttl>
    pub async fn ttl(&mut self, key: impl AsRef<[u8]>) -> Result<Response<i64>, Error> {
        self.execute(keys::ttl(key)).await
    }

    /// <https://redis.io/commands/hset>
    pub async fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<Response<i64>, Error> {
        self.execute(hash::hset(key, field, value)).await
    }

    /// `HSET` with every field of a struct or map.
    pub async fn hset_multiple<F: Serialize + ?Sized>(
        &mut self,
        key: impl AsRef<[u8]>,
        fields: &F,
    ) -> Result<Response<i64>, Error> {
        let command = hash::hset_multiple(key, fields)?;
        self.execute(command).await
    }

    /// <https://redis.io/commands/hget>
    pub async fn hget(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<Response<Option<BString>>, Error> {
        self.execute(hash::hget(key, field)).await
    }

    /// <https://redis.io/commands/hgetall>
    pub async fn hgetall(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<Response<IndexMap<BString, BString>>, Error> {
        self.execute(hash::hgetall(key)).await
    }

    /// <https://redis.io/commands/hdel>
    pub async fn hdel<F: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        fields: impl IntoIterator<Item = F>,
    ) -> Result<Response<i64>, Error> {
        self.execute(hash::hdel(key, fields)).await
    }

    /// <https://redis.io/commands/hincrby>
    pub async fn hincrby(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        increment: i64,
    ) -> Result<Response<i64>, Error> {
        self.execute(hash::hincrby(key, field, increment)).await
    }
}
