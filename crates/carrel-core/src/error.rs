//! Error taxonomy for backend interactions.
//!
//! Every failure a gateway call can produce collapses into one of the
//! [`ApiError`] variants. Partial batch results are not errors: they come
//! back as data inside `BatchIndexResponse`.

use thiserror::Error;

/// Result alias used throughout the backend-facing API.
pub type ApiResult<T> = Result<T, ApiError>;

/// A failed backend interaction.
///
/// `Network` and `Timeout` are transport-level; `Backend` carries the HTTP
/// status and the server's own message; `Decode` means the server answered
/// 2xx with a body that did not match the expected shape. `DuplicateSource`
/// and `InvalidInput` are raised client-side before a request is sent (the
/// backend's own duplicate rejection is mapped onto `DuplicateSource` too).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the client timeout.
    #[error("request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A successful response carried an undecodable body.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The document is already attached to the project.
    #[error("document {document_id} is already a source of project {project_id}")]
    DuplicateSource {
        project_id: String,
        document_id: String,
    },

    /// A request was rejected before dispatch.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// True for transport-level failures (no HTTP response at all).
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }

    /// The HTTP status, when the backend produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = ApiError::Backend {
            status: 404,
            message: "Document not found".to_string(),
        };
        assert_eq!(err.to_string(), "backend error (404): Document not found");
        assert_eq!(ApiError::Timeout.to_string(), "request timed out");

        let dup = ApiError::DuplicateSource {
            project_id: "p1".to_string(),
            document_id: "d1".to_string(),
        };
        assert_eq!(
            dup.to_string(),
            "document d1 is already a source of project p1"
        );
    }

    #[test]
    fn classification() {
        assert!(ApiError::Timeout.is_transport());
        assert!(ApiError::Network("refused".into()).is_transport());
        let err = ApiError::Backend {
            status: 500,
            message: "boom".into(),
        };
        assert!(!err.is_transport());
        assert_eq!(err.status(), Some(500));
        assert_eq!(ApiError::Timeout.status(), None);
    }
}
