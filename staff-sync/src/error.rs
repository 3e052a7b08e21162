use thiserror::Error;

/// Errors surfaced by the staff synchronization layer.
///
/// Every remote failure is folded into one of these variants at the client boundary;
/// [`StaffSyncError::user_message`] turns any of them into display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaffSyncError {
    /// Rejected locally before any request was sent.
    #[error("Validation Error: {0}")]
    Validation(String),

    /// The API could not be reached, or answered with a body that could not be decoded.
    #[error("Transport Error: {0}")]
    Transport(String),

    /// An authenticated route answered 401. The session has already been cleared.
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// The login endpoint answered 401.
    #[error("Authentication failed: {0}")]
    InvalidCredentials(String),

    /// Any other non-success status.
    #[error("Server Error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Remote search is fast-failed while the search breaker is open.
    #[error("Search service is temporarily unavailable")]
    SearchUnavailable,
}

impl StaffSyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }

    /// Whether a search failing with this error may fall back to local filtering.
    pub fn degrades_search(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Server { .. } | Self::SearchUnavailable
        )
    }

    /// Single human-readable message suitable for showing to the operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::InvalidCredentials(message) => message.clone(),
            Self::Server { message, .. } => message.clone(),
            Self::Transport(_) => {
                "Could not reach the staff service. Check your connection and try again."
                    .to_owned()
            }
            other => other.to_string(),
        }
    }
}
