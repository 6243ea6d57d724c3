use thiserror::Error;

/// A whole-call failure reported by a [`crate::QueueTransport`].
///
/// Per-entry rejections are not transport errors; they come back inside an
/// [`crate::EntryReport`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The queue service rejected or failed the request.
    #[error("{operation} on '{queue}' failed: {message}")]
    Request {
        operation: &'static str,
        queue: String,
        message: String,
    },

    /// The service answered without a field the caller relies on.
    #[error("{operation} response is missing '{field}'")]
    MalformedResponse {
        operation: &'static str,
        field: &'static str,
    },
}

impl TransportError {
    pub fn request(
        operation: &'static str,
        queue: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TransportError::Request {
            operation,
            queue: queue.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the queue client and the batch router.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouterError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// At least one entry of a send chunk was refused by the destination.
    #[error("failed to send {failed} of {total} messages to {queue}")]
    SendRejected {
        queue: String,
        failed: usize,
        total: usize,
    },

    /// A queue URL was blank.
    #[error("queue URL for {0} must not be empty")]
    InvalidQueue(&'static str),

    /// Router configuration is inconsistent.
    #[error("invalid router configuration: {0}")]
    InvalidConfig(&'static str),
}
