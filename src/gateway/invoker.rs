use std::{future::Future, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    foundation::error::{StudioError, StudioResult},
    keys::pool::{Credential, KeyPool},
};

/// Pause between attempts after a non-quota failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Runs one provider operation with credential rotation and bounded retries.
#[derive(Clone, Debug)]
pub struct ResilientInvoker {
    pool: Arc<KeyPool>,
    backoff: Duration,
}

impl ResilientInvoker {
    /// Invoker over a shared pool with the default backoff.
    pub fn new(pool: Arc<KeyPool>) -> Self {
        Self::with_backoff(pool, DEFAULT_BACKOFF)
    }

    /// Invoker with an explicit backoff (`Duration::ZERO` disables waiting).
    pub fn with_backoff(pool: Arc<KeyPool>, backoff: Duration) -> Self {
        Self { pool, backoff }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// Attempts allowed per call: every credential once, plus one extra.
    pub fn max_attempts(&self) -> usize {
        (self.pool.len() + 1).max(1)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Each attempt takes a fresh credential from the pool and reports the outcome back. Quota
    /// failures retry immediately (cooldown already steers selection elsewhere); other provider
    /// failures wait for the backoff first. Failures that say nothing about the credential
    /// (blocked content, malformed payloads, validation) propagate at once without touching the
    /// pool. The last failure is returned unchanged.
    pub async fn invoke<T, F, Fut>(&self, mut op: F) -> StudioResult<T>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = StudioResult<T>>,
    {
        let attempts = self.max_attempts();
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let credential = self
                .pool
                .select()
                .ok_or(StudioError::NoCredentialsAvailable)?;
            let key = credential.secret().to_string();

            match op(credential).await {
                Ok(value) => {
                    self.pool.report_success(&key);
                    debug!(attempt, "provider call succeeded");
                    return Ok(value);
                }
                Err(err) if !counts_against_credential(&err) => return Err(err),
                Err(err) => {
                    let quota = err.is_quota();
                    self.pool.report_failure(&key, quota);
                    warn!(attempt, attempts, quota, error = %err, "provider call failed");

                    if attempt >= attempts {
                        return Err(err);
                    }
                    if !quota && !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
    }
}

fn counts_against_credential(err: &StudioError) -> bool {
    matches!(
        err,
        StudioError::QuotaExhausted(_) | StudioError::TransientProvider { .. } | StudioError::Other(_)
    )
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/invoker.rs"]
mod tests;
