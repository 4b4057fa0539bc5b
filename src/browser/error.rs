//! CDP error types.

use thiserror::Error;

/// Browser launch and DevTools transport errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// No usable browser executable.
    #[error("Browser executable not found: {0}")]
    ExecutableNotFound(String),

    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    /// The DevTools HTTP endpoint did not answer.
    #[error("DevTools endpoint not available at {0}")]
    EndpointNotAvailable(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Navigation failed.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// JavaScript evaluation threw.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// No reply within the call timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Filesystem error while writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CdpError {
    /// True when the page connection is gone and no later call can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CdpError::SessionClosed | CdpError::WebSocket(_) | CdpError::Io(_)
        )
    }
}

impl From<tungstenite::Error> for CdpError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                CdpError::SessionClosed
            }
            tungstenite::Error::Io(io)
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                CdpError::Timeout(io.to_string())
            }
            other => CdpError::WebSocket(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        assert!(CdpError::SessionClosed.is_fatal());
        assert!(CdpError::from(tungstenite::Error::AlreadyClosed).is_fatal());
        assert!(CdpError::WebSocket("Sending after closing is not allowed".into()).is_fatal());
    }

    #[test]
    fn test_page_level_errors_are_not_fatal() {
        let timeout = std::io::Error::new(std::io::ErrorKind::WouldBlock, "again");
        assert!(!CdpError::from(tungstenite::Error::Io(timeout)).is_fatal());
        assert!(
            !CdpError::Protocol {
                code: -32000,
                message: "Cannot find context with specified id".into()
            }
            .is_fatal()
        );
        assert!(!CdpError::JavaScript("ReferenceError".into()).is_fatal());
    }
}
