/// Credential rotation with per-credential circuit breakers.
pub mod pool;
