//! # Queue Consumer
//!
//! Long-polls the inbound queue and forwards messages and receive errors on
//! bounded channels. Transport errors never terminate the poll loop; nothing
//! is acknowledged here, so a failed poll cannot lose messages.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::constants::{EMPTY_POLL_DELAY, POLL_WAIT, RECEIVE_BATCH_SIZE, VISIBILITY_TIMEOUT};

use super::errors::MessagingError;
use super::message::QueueMessage;

/// Capability interface over the inbound queue transport.
///
/// The production implementation is [`SqsTransport`]; tests substitute their
/// own to drive the consumer and engine without a live queue.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Poll the queue once, returning up to a batch of messages.
    async fn receive(&self) -> Result<Vec<QueueMessage>, MessagingError>;

    /// Delete a message by its receipt handle.
    async fn delete(&self, receipt: &str) -> Result<(), MessagingError>;
}

/// SQS-backed [`QueueTransport`].
#[derive(Debug, Clone)]
pub struct SqsTransport {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsTransport {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self { client, queue_url: queue_url.into() }
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(&self) -> Result<Vec<QueueMessage>, MessagingError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .visibility_timeout(VISIBILITY_TIMEOUT.as_secs() as i32)
            .wait_time_seconds(POLL_WAIT.as_secs() as i32)
            .max_number_of_messages(RECEIVE_BATCH_SIZE)
            .send()
            .await
            .map_err(|e| MessagingError::Receive(e.to_string()))?;

        let messages = output
            .messages()
            .iter()
            .map(|m| QueueMessage {
                body: m.body().unwrap_or_default().to_string(),
                id: m.message_id().unwrap_or_default().to_string(),
                receipt: m.receipt_handle().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> Result<(), MessagingError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| MessagingError::Delete(e.to_string()))?;
        Ok(())
    }
}

/// Receiving ends of the consumer's channels.
pub struct ConsumerChannels {
    pub messages: mpsc::Receiver<QueueMessage>,
    pub errors: mpsc::Receiver<MessagingError>,
}

/// Inbound queue consumer.
///
/// [`Consumer::start`] spawns the poll loop and hands back the message and
/// error channels. [`Consumer::close`] pushes a sentinel that stops the loop
/// at its next iteration boundary.
pub struct Consumer {
    transport: Arc<dyn QueueTransport>,
    finish_tx: mpsc::Sender<()>,
    finish_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Consumer {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        let (finish_tx, finish_rx) = mpsc::channel(1);
        Self { transport, finish_tx, finish_rx: Mutex::new(Some(finish_rx)) }
    }

    /// Spawn the poll loop.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same consumer.
    pub fn start(&self) -> (ConsumerChannels, tokio::task::JoinHandle<()>) {
        let mut finish_rx = self
            .finish_rx
            .lock()
            .expect("consumer state lock poisoned")
            .take()
            .expect("consumer already started");

        let (messages_tx, messages_rx) = mpsc::channel(1);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let transport = Arc::clone(&self.transport);

        let driver = tokio::spawn(async move {
            loop {
                if finish_rx.try_recv().is_ok() {
                    info!("consumer close requested");
                    return;
                }

                match transport.receive().await {
                    Err(e) => {
                        // Dropped error channel means the engine is gone.
                        if errors_tx.send(e).await.is_err() {
                            return;
                        }
                    }
                    Ok(batch) => {
                        if batch.is_empty() {
                            tokio::time::sleep(EMPTY_POLL_DELAY).await;
                            continue;
                        }
                        debug!(count = batch.len(), "received message batch");
                        for message in batch {
                            if messages_tx.send(message).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        (ConsumerChannels { messages: messages_rx, errors: errors_rx }, driver)
    }

    /// Request the poll loop to stop at its next iteration boundary.
    pub fn close(&self) {
        let _ = self.finish_tx.try_send(());
    }

    /// Delete a message from the queue.
    pub async fn delete(&self, message: &QueueMessage) -> Result<(), MessagingError> {
        self.transport.delete(&message.receipt).await
    }
}
