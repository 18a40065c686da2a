//! Store-side lease procedures and the guard that keeps them loaded.
//!
//! Each procedure is invoked by the SHA-1 of its body. Stores drop their
//! script cache on restart or flush; when that happens the guard reloads all
//! bodies and retries the failed call once. Loading is idempotent, so
//! several electors reinstalling at the same moment need no coordination.

use crate::{store::Store, Error, Result, StoreResult};
use data_encoding::HEXLOWER;
use sha1::{Digest, Sha1};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

const ACQUIRE_BODY: &str = r#"if redis.call("SET", KEYS[1], ARGV[1], "NX", "PX", ARGV[2]) then
    return 1
end
return 0
"#;

const RENEW_BODY: &str = r#"if redis.call("GET", KEYS[1]) == ARGV[1] then
    redis.call("PEXPIRE", KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

const RELEASE_BODY: &str = r#"if redis.call("GET", KEYS[1]) == ARGV[1] then
    redis.call("DEL", KEYS[1])
    return 1
end
return 0
"#;

/// One of the three atomic lease operations.
///
/// Arguments are positional: `ARGV[1]` is the owner identity, `ARGV[2]` the
/// TTL in milliseconds (acquire and renew only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// Create the record if the key is vacant.
    Acquire,
    /// Push the expiry forward if the caller still owns the record.
    Renew,
    /// Delete the record if the caller owns it.
    Release,
}

impl Procedure {
    pub const ALL: [Procedure; 3] = [Procedure::Acquire, Procedure::Renew, Procedure::Release];

    pub fn body(self) -> &'static str {
        match self {
            Procedure::Acquire => ACQUIRE_BODY,
            Procedure::Renew => RENEW_BODY,
            Procedure::Release => RELEASE_BODY,
        }
    }

    /// Lowercase hex SHA-1 of the body, the handle stores index scripts by.
    pub fn handle(self) -> &'static str {
        static HANDLES: OnceLock<[String; 3]> = OnceLock::new();
        let handles = HANDLES.get_or_init(|| Procedure::ALL.map(|p| content_handle(p.body())));
        &handles[self as usize]
    }

    pub fn from_body(body: &str) -> Option<Procedure> {
        Procedure::ALL.into_iter().find(|p| p.body() == body)
    }
}

pub fn content_handle(body: &str) -> String {
    HEXLOWER.encode(&Sha1::digest(body.as_bytes()))
}

/// Executes procedures by handle, reinstalling them once if the store forgot.
#[derive(Debug, Clone)]
pub struct ScriptGuard {
    store: Arc<dyn Store>,
}

impl ScriptGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Loads every procedure body into the store.
    pub async fn install(&self) -> StoreResult<()> {
        for procedure in Procedure::ALL {
            let handle = self.store.load_atomic(procedure.body()).await?;
            if handle != procedure.handle() {
                warn!(?procedure, %handle, expected = procedure.handle(), "store returned an unexpected script handle");
            }
        }
        Ok(())
    }

    /// Runs `procedure`, recovering from a single missing-script failure.
    ///
    /// A second miss after reinstalling, or any other store failure, is
    /// returned unchanged.
    pub async fn run(&self, procedure: Procedure, keys: &[String], args: &[String]) -> Result<i64> {
        match self.store.execute_atomic(procedure.handle(), keys, args).await {
            Err(err) if err.is_no_script() => {
                info!(?procedure, "store lost lease scripts, reinstalling");
                self.install().await.map_err(Error::ScriptInstall)?;
                Ok(self.store.execute_atomic(procedure.handle(), keys, args).await?)
            }
            result => Ok(result?),
        }
    }
}
