use crate::{
    identity::{Identity, LeaseKey},
    scripts::{Procedure, ScriptGuard},
    Result,
};
use std::time::Duration;

/// Acquire, renew and release of one lease record on behalf of one identity.
///
/// Ownership is checked inside the store procedure, never by a read
/// followed by a write from here.
#[derive(Debug, Clone)]
pub struct LeaseClient {
    guard: ScriptGuard,
    key: LeaseKey,
    id: Identity,
}

impl LeaseClient {
    pub fn new(guard: ScriptGuard, key: LeaseKey, id: Identity) -> Self {
        Self { guard, key, id }
    }

    pub fn key(&self) -> &LeaseKey {
        &self.key
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Creates the record if no one holds it. `true` means this identity now leads.
    pub async fn acquire(&self, ttl: Duration) -> Result<bool> {
        self.call(Procedure::Acquire, Some(ttl)).await
    }

    /// Extends the record if this identity still owns it.
    pub async fn renew(&self, ttl: Duration) -> Result<bool> {
        self.call(Procedure::Renew, Some(ttl)).await
    }

    /// Deletes the record if this identity owns it.
    pub async fn release(&self) -> Result<bool> {
        self.call(Procedure::Release, None).await
    }

    /// Current owner token of the record, if any.
    pub async fn holder(&self) -> Result<Option<String>> {
        Ok(self.guard.store().read(self.key.as_str()).await?)
    }

    async fn call(&self, procedure: Procedure, ttl: Option<Duration>) -> Result<bool> {
        let keys = [self.key.as_str().to_string()];
        let mut args = vec![self.id.as_str().to_string()];
        if let Some(ttl) = ttl {
            args.push(ttl.as_millis().to_string());
        }

        let reply = self.guard.run(procedure, &keys, &args).await?;
        Ok(reply == 1)
    }
}
