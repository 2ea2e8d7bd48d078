//! # Dispatch Engine
//!
//! The message pump at the heart of the worker. Drives the queue consumer,
//! verifies each body against the configured keyring, decodes and routes it
//! to a handler under a bounded in-flight pool, then runs the post-handle
//! protocol: reply on the outbound queue, then delete the inbound message,
//! both under bounded exponential backoff.
//!
//! Within one message the stages are strictly sequential; across messages
//! no ordering is guaranteed. The reply and the delete are not atomic
//! against crashes, so downstream consumers must tolerate a duplicate reply
//! after redelivery.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::config::Config;
use crate::constants::{MAX_CONCURRENT_HANDLERS, RECEIVE_IDLE_DELAY};
use crate::messaging::{
    Consumer, QueueMessage, QueueTransport, Reply, ReplyError, ReplySender, SqsReplyProducer,
    SqsTransport,
};
use crate::resilience::{reply_backoff, retry_notify};

pub mod errors;
pub mod registry;
pub mod request;
pub mod verify;

pub use errors::{DispatchError, EngineError};
pub use registry::HandlerRegistry;
pub use request::Request;
pub use verify::{ClearsignVerifier, EnvelopeVerifier};

/// Observer applied to per-message errors.
///
/// The default implementation logs; tests install their own to assert on
/// the error stream.
pub trait ErrorObserver: Send + Sync {
    fn on_error(&self, message_id: &str, error: &(dyn std::error::Error + 'static));
}

/// [`ErrorObserver`] that reports through tracing.
pub struct LoggingObserver;

impl ErrorObserver for LoggingObserver {
    fn on_error(&self, message_id: &str, error: &(dyn std::error::Error + 'static)) {
        error!(message_id = %message_id, error = %error, "message processing error");
    }
}

/// Queue identity configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub consumer_queue: String,
    pub consumer_queue_url: String,
    pub producer_queue: String,
    pub region: String,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            consumer_queue: config.consumer_queue.clone(),
            consumer_queue_url: config.consumer_queue_url.clone(),
            producer_queue: config.producer_queue.clone(),
            region: config.aws_region.clone(),
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.consumer_queue.is_empty() {
            return Err(EngineError::MissingConsumerQueue);
        }
        if self.consumer_queue_url.is_empty() {
            return Err(EngineError::MissingConsumerQueueUrl);
        }
        if self.producer_queue.is_empty() {
            return Err(EngineError::MissingProducerQueue);
        }
        if self.region.is_empty() {
            return Err(EngineError::MissingRegion);
        }
        Ok(())
    }
}

/// The dispatch engine.
pub struct Engine {
    consumer: Consumer,
    verifier: Arc<dyn EnvelopeVerifier>,
    producer: Arc<dyn ReplySender>,
    observer: Arc<dyn ErrorObserver>,
    handlers: HandlerRegistry,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    /// Build a production engine: SQS transport and producer, clearsign
    /// verification with the configured public keyring.
    pub fn from_config(
        config: &Config,
        sqs: aws_sdk_sqs::Client,
        handlers: HandlerRegistry,
    ) -> Result<Self, EngineError> {
        let engine_config = EngineConfig::from_config(config);
        let verifier = ClearsignVerifier::from_armored(&config.verification_key)?;
        let transport = SqsTransport::new(sqs.clone(), &config.consumer_queue_url);
        let producer = SqsReplyProducer::new(sqs, &config.producer_queue);

        Self::with_capabilities(
            engine_config,
            Arc::new(transport),
            Arc::new(producer),
            Arc::new(verifier),
            Arc::new(LoggingObserver),
            handlers,
        )
    }

    /// Build an engine from explicit capabilities.
    pub fn with_capabilities(
        config: EngineConfig,
        transport: Arc<dyn QueueTransport>,
        producer: Arc<dyn ReplySender>,
        verifier: Arc<dyn EnvelopeVerifier>,
        observer: Arc<dyn ErrorObserver>,
        handlers: HandlerRegistry,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            consumer: Consumer::new(transport),
            verifier,
            producer,
            observer,
            handlers,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_HANDLERS)),
        })
    }

    /// Run the engine until `shutdown` fires, then drain in-flight handlers.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(handlers = ?self.handlers.registered_types(), "starting engine");

        let (mut channels, driver) = self.consumer.start();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                Some(error) = channels.errors.recv() => {
                    self.observer.on_error("", &error);
                }
                Some(message) = channels.messages.recv() => {
                    Self::spawn_handler(&self, &mut tasks, &shutdown, message).await;
                }
                _ = shutdown.cancelled() => {
                    info!("halting consumer");
                    self.consumer.close();
                    break;
                }
                _ = tokio::time::sleep(RECEIVE_IDLE_DELAY) => {
                    // Reap finished handlers so the set stays small.
                    while tasks.try_join_next().is_some() {}
                }
            }
        }

        // Dropping the channels unblocks a consumer mid-forward.
        drop(channels);
        info!("waiting for handlers");
        while tasks.join_next().await.is_some() {}
        let _ = driver.await;
        info!("engine stopped");
    }

    /// Acquire an in-flight slot, then process the message off the loop.
    ///
    /// Blocks while all slots are in use; the slot is held for the whole
    /// handler invocation including the post-handle protocol.
    async fn spawn_handler(
        engine: &Arc<Self>,
        tasks: &mut JoinSet<()>,
        shutdown: &CancellationToken,
        message: QueueMessage,
    ) {
        let Ok(permit) = Arc::clone(&engine.semaphore).acquire_owned().await else {
            return;
        };

        let engine = Arc::clone(engine);
        let cancel = shutdown.child_token();
        tasks.spawn(async move {
            let _permit = permit;
            engine.process(cancel, message).await;
        });
    }

    async fn process(&self, cancel: CancellationToken, message: QueueMessage) {
        let span = info_span!("message", message_id = %message.id);
        async {
            let result = self.dispatch(&cancel, &message).await;
            self.post_handle(&cancel, &message, result).await;
        }
        .instrument(span)
        .await
    }

    /// verify → decode → route → handle.
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        message: &QueueMessage,
    ) -> Result<(), DispatchError> {
        let plaintext = self.verifier.verify(message)?;

        let mut request: Request = serde_json::from_slice(&plaintext)
            .map_err(|e| DispatchError::payload_decode(&e))?;
        request.id = message.id.clone();

        let Some(handler) = self.handlers.get(&request.message_type) else {
            return Err(DispatchError::MissingHandler {
                message_type: request.message_type.clone(),
            });
        };

        handler.handle(cancel, &request).await.map_err(DispatchError::from)
    }

    /// Reply, then delete, each under bounded backoff.
    ///
    /// The delete begins only after the reply attempt finishes, successfully
    /// or exhaustively; reply exhaustion does not block the delete. Both
    /// stop retrying when the request context is cancelled, and neither
    /// outcome is fatal to the engine.
    async fn post_handle(
        &self,
        cancel: &CancellationToken,
        message: &QueueMessage,
        result: Result<(), DispatchError>,
    ) {
        let error = result.err();
        if let Some(e) = &error {
            self.observer.on_error(&message.id, e);
        }

        let reply = Reply {
            error: error
                .as_ref()
                .map(|e| ReplyError { data: e.reply_data(), message: e.to_string() }),
            id: message.id.clone(),
            success: error.is_none(),
        };

        match serde_json::to_string(&reply) {
            Ok(body) => {
                let _ = retry_notify(
                    reply_backoff(),
                    cancel,
                    || async { self.producer.send(&body).await },
                    |e| self.observer.on_error(&message.id, e),
                )
                .await;
            }
            Err(e) => self.observer.on_error(&message.id, &e),
        }

        let _ = retry_notify(
            reply_backoff(),
            cancel,
            || async { self.consumer.delete(message).await },
            |e| self.observer.on_error(&message.id, e),
        )
        .await;
    }
}
