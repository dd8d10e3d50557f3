/// Convenience result type used across mockforge.
pub type StudioResult<T> = Result<T, StudioError>;

/// Top-level error taxonomy used by studio and gateway APIs.
#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    /// The provider refused to produce content (safety, recitation, prohibited content).
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The provider signalled a rate or usage limit for the credential.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The key pool has no configured credentials at all.
    #[error("no API credentials available")]
    NoCredentialsAvailable,

    /// Any other provider-side or transport failure.
    #[error("provider error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    TransientProvider {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Provider-supplied or transport message.
        message: String,
    },

    /// A successful response that did not carry the expected payload.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The credit balance cannot cover the requested operation.
    #[error("insufficient credits (balance {balance})")]
    InsufficientCredits {
        /// Balance at the time of the attempt.
        balance: i64,
    },

    /// Invalid user-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Durable storage failures.
    #[error("storage error: {0}")]
    Storage(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse category shown to end users after a failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserFacing {
    /// The request was refused on content grounds.
    Blocked,
    /// Every credential is cooling down; retrying later may succeed.
    Busy,
    /// Anything else.
    Failed,
}

const QUOTA_MARKERS: [&str; 4] = ["429", "quota", "limit", "exhausted"];

impl StudioError {
    /// Build a [`StudioError::ContentBlocked`] value.
    pub fn blocked(msg: impl Into<String>) -> Self {
        Self::ContentBlocked(msg.into())
    }

    /// Build a [`StudioError::QuotaExhausted`] value.
    pub fn quota(msg: impl Into<String>) -> Self {
        Self::QuotaExhausted(msg.into())
    }

    /// Build a [`StudioError::TransientProvider`] value.
    pub fn provider(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::TransientProvider {
            status,
            message: msg.into(),
        }
    }

    /// Build a [`StudioError::MalformedResponse`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Build a [`StudioError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StudioError::Storage`] value.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Build a [`StudioError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this failure should be treated as a quota/rate-limit signal.
    ///
    /// Structured signals win; otherwise the rendered message is scanned for the
    /// case-insensitive markers `429`, `quota`, `limit` and `exhausted`.
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExhausted(_) => true,
            Self::TransientProvider {
                status: Some(429), ..
            } => true,
            Self::NoCredentialsAvailable | Self::InsufficientCredits { .. } => false,
            other => message_signals_quota(&other.to_string()),
        }
    }

    /// Map the error onto the category presented to the user.
    pub fn user_category(&self) -> UserFacing {
        match self {
            Self::ContentBlocked(_) => UserFacing::Blocked,
            Self::NoCredentialsAvailable => UserFacing::Busy,
            e if e.is_quota() => UserFacing::Busy,
            _ => UserFacing::Failed,
        }
    }
}

/// Substring heuristic used when the provider gives no structured quota signal.
pub fn message_signals_quota(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|m| lower.contains(m))
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
