/// Durable string key-value slots.
pub mod kv;
