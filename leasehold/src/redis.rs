//! [`Store`] over a Redis-compatible server (Redis, Valkey, KVRocks).

use crate::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::{Client, ErrorKind, RedisError};

impl From<RedisError> for StoreError {
    /// Classifies on the reply code and detail, not the display text: the
    /// client prefixes server errors with its own description, and KVRocks
    /// reports a missing script as a generic `ERR NOSCRIPT ...` reply.
    fn from(err: RedisError) -> Self {
        if is_no_script(&err) {
            StoreError::NoScript {
                message: err.to_string(),
            }
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

fn is_no_script(err: &RedisError) -> bool {
    if err.kind() == ErrorKind::NoScriptError || err.code() == Some("NOSCRIPT") {
        return true;
    }
    match (err.code(), err.detail()) {
        (Some(code), Some(detail)) => {
            StoreError::classify(format!("{code} {detail}")).is_no_script()
        }
        _ => false,
    }
}

/// Shares one multiplexed connection between every call.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Opens a connection to `url`, e.g. `redis://localhost:6379/10`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(::redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?)
    }

    async fn execute_atomic(
        &self,
        handle: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64> {
        let mut cmd = ::redis::cmd("EVALSHA");
        cmd.arg(handle).arg(keys.len());
        for key in keys {
            cmd.arg(key);
        }
        for arg in args {
            cmd.arg(arg);
        }

        let mut conn = self.conn.clone();
        Ok(cmd.query_async::<i64>(&mut conn).await?)
    }

    async fn load_atomic(&self, body: &str) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        Ok(::redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(body)
            .query_async::<String>(&mut conn)
            .await?)
    }
}
