use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::{
    foundation::clock::SharedClock,
    foundation::error::{StudioError, StudioResult},
    storage::kv::SharedStore,
};

/// Store slot holding the serialized pool state.
pub const STATE_KEY: &str = "mockforge.key_manager.v1";

/// Circuit-breaker state of one credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Healthy.
    Closed,
    /// Blocked until `half_open_retry_at`.
    Open,
    /// One trial call allowed.
    HalfOpen,
}

/// Timing and threshold knobs for the breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Cooldown after ordinary failures.
    pub short_cooldown_ms: u64,
    /// Cooldown after quota failures.
    pub quota_cooldown_ms: u64,
    /// Deadline applied when a half-open trial fails.
    pub half_open_retry_ms: u64,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            short_cooldown_ms: 60_000,
            quota_cooldown_ms: 300_000,
            half_open_retry_ms: 30_000,
        }
    }
}

/// Persisted health record for one credential.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// The secret itself.
    pub id: String,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Time of the most recent failure.
    pub last_failure_at: Option<u64>,
    /// Whether the most recent failure was quota-type.
    pub last_failure_was_quota: bool,
    /// Breaker state.
    pub circuit_state: CircuitState,
    /// Time the credential was last handed out.
    pub last_used_at: u64,
    /// Successful calls.
    pub success_count: u64,
    /// All reported calls.
    pub total_requests: u64,
    /// Deadline after which an open breaker admits one trial.
    pub half_open_retry_at: Option<u64>,
}

impl CredentialRecord {
    /// Fresh, healthy record.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            consecutive_failures: 0,
            last_failure_at: None,
            last_failure_was_quota: false,
            circuit_state: CircuitState::Closed,
            last_used_at: 0,
            success_count: 0,
            total_requests: 0,
            half_open_retry_at: None,
        }
    }

    fn failure_window_active(&self, now: u64, policy: &CooldownPolicy) -> bool {
        let Some(at) = self.last_failure_at else {
            return false;
        };
        let window = if self.last_failure_was_quota {
            policy.quota_cooldown_ms
        } else {
            policy.short_cooldown_ms
        };
        now.saturating_sub(at) < window
    }

    fn trial_in_flight(&self, now: u64, policy: &CooldownPolicy) -> bool {
        // A half-open credential already handed out since its deadline is busy with its single
        // trial; an abandoned trial is released after the short cooldown.
        match self.half_open_retry_at {
            Some(retry_at) => {
                self.last_used_at >= retry_at
                    && now.saturating_sub(self.last_used_at) < policy.short_cooldown_ms
            }
            None => false,
        }
    }

    /// Pure cooldown check; never changes state.
    pub fn on_cooldown(&self, now: u64, policy: &CooldownPolicy) -> bool {
        match self.circuit_state {
            CircuitState::Open => match self.half_open_retry_at {
                Some(retry_at) if now >= retry_at => self.failure_window_active(now, policy),
                _ => true,
            },
            CircuitState::HalfOpen => {
                self.trial_in_flight(now, policy) || self.failure_window_active(now, policy)
            }
            CircuitState::Closed => self.failure_window_active(now, policy),
        }
    }

    /// Cooldown check used by selection: an open breaker past its deadline flips to half-open.
    fn admit(&mut self, now: u64, policy: &CooldownPolicy) -> bool {
        if self.circuit_state == CircuitState::Open
            && self.half_open_retry_at.is_some_and(|t| now >= t)
        {
            debug!(key = %mask(&self.id), "circuit half-open");
            self.circuit_state = CircuitState::HalfOpen;
        }
        !self.on_cooldown(now, policy)
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure_was_quota = false;
        self.circuit_state = CircuitState::Closed;
        self.half_open_retry_at = None;
        self.success_count += 1;
        self.total_requests += 1;
    }

    fn record_failure(&mut self, now: u64, is_quota: bool, policy: &CooldownPolicy) {
        self.consecutive_failures += 1;
        self.total_requests += 1;
        self.last_failure_at = Some(now);
        self.last_failure_was_quota = is_quota;

        if self.circuit_state == CircuitState::HalfOpen {
            self.circuit_state = CircuitState::Open;
            self.half_open_retry_at = Some(now + policy.half_open_retry_ms);
            warn!(key = %mask(&self.id), "half-open trial failed; circuit re-opened");
        } else if self.consecutive_failures >= policy.failure_threshold || is_quota {
            let cooldown = if is_quota {
                policy.quota_cooldown_ms
            } else {
                policy.short_cooldown_ms
            };
            self.circuit_state = CircuitState::Open;
            self.half_open_retry_at = Some(now + cooldown);
            warn!(
                key = %mask(&self.id),
                failures = self.consecutive_failures,
                quota = is_quota,
                cooldown_ms = cooldown,
                "circuit opened"
            );
        }
    }
}

/// A credential handed out by [`KeyPool::select`]. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret, for the provider request only.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Suffix-only rendering for logs and status output.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

/// Render only the last four characters of a secret.
pub fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

/// Read-only status row for observability.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct KeyStatus {
    /// Masked credential suffix.
    pub key: String,
    /// Breaker state.
    pub circuit_state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// All reported calls.
    pub total_requests: u64,
    /// Successful calls.
    pub success_count: u64,
    /// Whether selection currently skips this credential.
    pub on_cooldown: bool,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct PersistedPool {
    records: Vec<CredentialRecord>,
}

/// Rotating pool of provider credentials with per-credential circuit breakers.
///
/// Shared state lives in the key-value store; every operation re-reads it, applies its change
/// and writes it back inside one `read_modify_write`, so several pools over the same store (other
/// tabs, other processes) converge with last-writer-wins semantics.
#[derive(Debug)]
pub struct KeyPool {
    records: Mutex<Vec<CredentialRecord>>,
    store: SharedStore,
    clock: SharedClock,
    policy: CooldownPolicy,
}

impl KeyPool {
    /// Build a pool over already-deduplicated secrets.
    pub fn new(keys: Vec<String>, store: SharedStore, clock: SharedClock) -> Self {
        Self::with_policy(keys, store, clock, CooldownPolicy::default())
    }

    /// Build a pool with custom breaker timings.
    pub fn with_policy(
        keys: Vec<String>,
        store: SharedStore,
        clock: SharedClock,
        policy: CooldownPolicy,
    ) -> Self {
        let records = crate::foundation::config::dedupe_keys(keys)
            .into_iter()
            .map(CredentialRecord::new)
            .collect();
        Self {
            records: Mutex::new(records),
            store,
            clock,
            policy,
        }
    }

    /// Number of configured credentials.
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether no credentials are configured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Breaker policy in effect.
    pub fn policy(&self) -> CooldownPolicy {
        self.policy
    }

    /// Pick the healthiest credential and stamp its last-used time.
    ///
    /// Returns `None` only when the pool has no credentials. When every credential is cooling
    /// down the least-recently-failed one is returned anyway.
    pub fn select(&self) -> Option<Credential> {
        let policy = self.policy;
        self.transact(|records, now| {
            let admitted: Vec<usize> = records
                .iter_mut()
                .enumerate()
                .filter_map(|(i, r)| r.admit(now, &policy).then_some(i))
                .collect();
            let best = admitted
                .into_iter()
                .min_by_key(|&i| (records[i].consecutive_failures, records[i].last_used_at));

            let chosen = match best {
                Some(i) => i,
                None => {
                    let i = records
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, r)| r.last_failure_at.unwrap_or(0))
                        .map(|(i, _)| i)?;
                    warn!(
                        key = %mask(&records[i].id),
                        "all credentials cooling down; using least recently failed"
                    );
                    i
                }
            };

            let rec = &mut records[chosen];
            rec.last_used_at = now;
            debug!(key = %mask(&rec.id), failures = rec.consecutive_failures, "credential selected");
            Some(Credential::new(rec.id.clone()))
        })
    }

    /// Record a successful call.
    pub fn report_success(&self, id: &str) {
        self.transact(|records, _now| {
            if let Some(rec) = records.iter_mut().find(|r| r.id == id) {
                rec.record_success();
            }
        });
    }

    /// Record a failed call and apply breaker transitions.
    pub fn report_failure(&self, id: &str, is_quota: bool) {
        let policy = self.policy;
        self.transact(|records, now| {
            if let Some(rec) = records.iter_mut().find(|r| r.id == id) {
                rec.record_failure(now, is_quota, &policy);
            }
        });
    }

    /// Snapshot of every credential's health, masked.
    pub fn status(&self) -> Vec<KeyStatus> {
        let now = self.clock.now_ms();
        let records = match self.lock() {
            Ok(mut guard) => {
                if let Ok(Some(persisted)) = self.load_persisted() {
                    merge(&mut guard, persisted);
                }
                guard.clone()
            }
            Err(_) => return Vec::new(),
        };
        records
            .iter()
            .map(|r| KeyStatus {
                key: mask(&r.id),
                circuit_state: r.circuit_state,
                consecutive_failures: r.consecutive_failures,
                total_requests: r.total_requests,
                success_count: r.success_count,
                on_cooldown: r.on_cooldown(now, &self.policy),
            })
            .collect()
    }

    /// Full record for one credential, after reconciling with the store.
    pub fn record(&self, id: &str) -> Option<CredentialRecord> {
        let mut guard = self.lock().ok()?;
        if let Ok(Some(persisted)) = self.load_persisted() {
            merge(&mut guard, persisted);
        }
        guard.iter().find(|r| r.id == id).cloned()
    }

    fn lock(&self) -> StudioResult<MutexGuard<'_, Vec<CredentialRecord>>> {
        self.records
            .lock()
            .map_err(|_| StudioError::storage("key pool mutex poisoned"))
    }

    fn load_persisted(&self) -> StudioResult<Option<PersistedPool>> {
        match self.store.get_string(STATE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reconcile with the store, run `f`, persist. Store failures degrade to in-memory state.
    fn transact<R>(&self, mut f: impl FnMut(&mut Vec<CredentialRecord>, u64) -> R) -> R {
        let now = self.clock.now_ms();
        let mut guard = match self.records.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut out = None;
        let res = self.store.read_modify_write(STATE_KEY, &mut |raw| {
            if let Some(raw) = raw {
                match serde_json::from_str::<PersistedPool>(&raw) {
                    Ok(persisted) => merge(&mut guard, persisted),
                    Err(e) => warn!(error = %e, "ignoring unreadable key pool state"),
                }
            }
            if out.is_none() {
                out = Some(f(&mut *guard, now));
            }
            let blob = PersistedPool {
                records: guard.clone(),
            };
            Ok(Some(serde_json::to_string(&blob)?))
        });

        if let Err(e) = res {
            warn!(error = %e, "key pool state not persisted");
        }
        match out {
            Some(out) => out,
            None => f(&mut *guard, now),
        }
    }
}

/// Overwrite configured records with their persisted counterparts. Unknown persisted ids are
/// ignored; configured ids missing from the blob keep their in-memory state.
fn merge(records: &mut [CredentialRecord], persisted: PersistedPool) {
    for p in persisted.records {
        if let Some(slot) = records.iter_mut().find(|r| r.id == p.id) {
            *slot = p;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keys/pool.rs"]
mod tests;
