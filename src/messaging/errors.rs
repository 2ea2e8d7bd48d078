//! Error types for queue transport operations.

use thiserror::Error;

/// Errors raised by the queue transport.
///
/// All variants are per-operation and non-fatal: receive errors are surfaced
/// on the consumer's error channel, reply and delete errors feed the dispatch
/// engine's retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagingError {
    #[error("failed to receive messages: {0}")]
    Receive(String),
    #[error("failed to delete message: {0}")]
    Delete(String),
    #[error("failed to resolve queue url: {0}")]
    QueueUrl(String),
    #[error("queue url missing from response")]
    MissingQueueUrl,
    #[error("failed to send message: {0}")]
    Send(String),
}
