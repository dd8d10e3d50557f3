/// Free-text canvas command interpretation.
pub mod command;
/// Credential-rotating retry loop.
pub mod invoker;
/// Request construction for every AI operation.
pub mod prompt;
/// Provider trait, REST client and scripted test double.
pub mod provider;
/// Credit-charged AI operations.
pub mod service;
/// `generateContent` wire model and response validation.
pub mod wire;
