/// Longest body excerpt carried in a remote failure message.
pub const DIAGNOSTIC_BODY_LIMIT: usize = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("unexpected response from remote: {0}")]
    InvalidResponse(String),

    #[error("field '{0}' is read-only")]
    ReadOnlyField(String),
}

impl SyncError {
    pub fn remote(status: u16, body: &str) -> Self {
        Self::Remote {
            status,
            message: remote_diagnostic(status, body),
        }
    }

    pub fn transport(err: anyhow::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Short user-facing description of a non-success response.
pub fn remote_diagnostic(status: u16, body: &str) -> String {
    if indicates_missing_collection(body) {
        return format!(
            "Database not found ({}). Check the database ID and make sure the database is shared with the integration.",
            status
        );
    }
    let excerpt: String = body.trim().chars().take(DIAGNOSTIC_BODY_LIMIT).collect();
    format!("Remote request failed ({}): {}", status, excerpt)
}

fn indicates_missing_collection(body: &str) -> bool {
    body.contains("object_not_found") || body.contains("Could not find database")
}
