/// Shared error type used across all integration-core crates.
///
/// Kinds map onto the failure taxonomy the pipeline distinguishes:
/// transport failures retry with backoff, protocol failures carry the
/// server's status and body, schema violations skip the offending line,
/// and conflicts surface to the caller as structured results.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Network-level failure (connect, DNS, TLS). Retriable.
    #[error("HTTP: {0}")]
    Http(String),

    /// The request exceeded its time budget and was cancelled.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Non-2xx response from Super-Kanban with the server's payload.
    #[error("super-kanban returned {status}")]
    Protocol { status: u16, body: Option<String> },

    /// No credential resolvable for the requested auth scope.
    #[error("auth missing: {0}")]
    AuthMissing(String),

    /// A Super-Kanban task lock is already held by another owner.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// External-ID canonicalization failed (embedded `:` or parent mismatch).
    #[error("invalid external id: {0}")]
    InvalidExternalId(String),

    /// No session binding resolvable for an (agent, session) pair.
    #[error("binding missing: {0}")]
    BindingMissing(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the spool sender should retry this failure with backoff.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
