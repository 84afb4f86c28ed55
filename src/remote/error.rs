//! Remote document service errors.

use thiserror::Error;

use crate::document::DocumentError;

/// Errors raised while talking to the document service.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("request to {command} failed: {source}")]
    Http {
        /// RPC command name.
        command: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{command} returned HTTP {status}: {body}")]
    Status {
        /// RPC command name.
        command: String,
        status: u16,
        /// Response body as returned by the service.
        body: String,
    },

    /// The response body is not valid JSON.
    #[error("invalid response from {command}: {source}")]
    Decode {
        /// RPC command name.
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response is JSON but not a usable file payload.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The file does not exist on the service.
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// The submitted revision is stale.
    #[error("revision conflict: file is at revision {expected}, change submitted against {actual}")]
    Conflict { expected: i64, actual: i64 },

    /// The service refused a change primitive.
    #[error("change rejected: {message}")]
    Rejected { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_includes_body() {
        let error = RemoteError::Status {
            command: "update-file".into(),
            status: 400,
            body: "{\"type\":\"validation\"}".into(),
        };
        let msg = error.to_string();
        assert!(msg.contains("update-file"));
        assert!(msg.contains("400"));
        assert!(msg.contains("validation"));
    }

    #[test]
    fn conflict_display() {
        let msg = RemoteError::Conflict {
            expected: 5,
            actual: 4,
        }
        .to_string();
        assert!(msg.contains("revision 5"));
    }
}
