//! # Reply Producer
//!
//! Posts serialized replies to the outbound queue. The queue URL is resolved
//! by name on first use and cached for the lifetime of the producer.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use super::errors::MessagingError;

/// Capability interface for posting replies.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), MessagingError>;
}

/// SQS-backed [`ReplySender`].
pub struct SqsReplyProducer {
    client: aws_sdk_sqs::Client,
    queue_name: String,
    queue_url: OnceCell<String>,
}

impl SqsReplyProducer {
    pub fn new(client: aws_sdk_sqs::Client, queue_name: impl Into<String>) -> Self {
        Self { client, queue_name: queue_name.into(), queue_url: OnceCell::new() }
    }

    async fn resolve_queue_url(&self) -> Result<&str, MessagingError> {
        let url = self
            .queue_url
            .get_or_try_init(|| async {
                let output = self
                    .client
                    .get_queue_url()
                    .queue_name(&self.queue_name)
                    .send()
                    .await
                    .map_err(|e| MessagingError::QueueUrl(e.to_string()))?;

                output
                    .queue_url()
                    .map(str::to_string)
                    .ok_or(MessagingError::MissingQueueUrl)
            })
            .await?;
        Ok(url)
    }
}

#[async_trait]
impl ReplySender for SqsReplyProducer {
    async fn send(&self, body: &str) -> Result<(), MessagingError> {
        let queue_url = self.resolve_queue_url().await?;

        self.client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| MessagingError::Send(e.to_string()))?;

        debug!(queue = %self.queue_name, "reply sent");
        Ok(())
    }
}
