/// Time source shared by the pool, the ledger and the debouncers.
pub mod clock;
/// Runtime configuration and credential collection.
pub mod config;
/// Crate error taxonomy.
pub mod error;
/// Range clamping and fixed-point pixel helpers.
pub mod math;
