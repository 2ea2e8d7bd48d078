//! Shared test doubles: capability-trait mocks for the queue transport,
//! reply producer, envelope verifier, object store and handlers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use deploy_worker::engine::{
    DispatchError, EngineConfig, EnvelopeVerifier, ErrorObserver, Request,
};
use deploy_worker::handler::{HandlerError, MessageHandler};
use deploy_worker::messaging::{MessagingError, QueueMessage, QueueTransport, ReplySender};
use deploy_worker::nomad::{Job, JobSource, ManifestError};
use deploy_worker::storage::{ObjectStore, ObjectStream, StorageError};

/// A queue identity that passes engine validation.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        consumer_queue: "foo".to_string(),
        consumer_queue_url: "bar".to_string(),
        producer_queue: "baz".to_string(),
        region: "qux".to_string(),
    }
}

pub fn queue_message(body: &str, id: &str) -> QueueMessage {
    QueueMessage { body: body.to_string(), id: id.to_string(), receipt: id.to_string() }
}

/// Transport that serves one scripted batch, then polls empty.
pub struct MockTransport {
    batch: Mutex<Vec<QueueMessage>>,
    errorable: bool,
    exhausted: AtomicBool,
    pub deleted: Mutex<Vec<String>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockTransport {
    pub fn with_messages(messages: Vec<QueueMessage>) -> Self {
        Self {
            batch: Mutex::new(messages),
            errorable: false,
            exhausted: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
            events: None,
        }
    }

    pub fn errorable() -> Self {
        Self {
            batch: Mutex::new(Vec::new()),
            errorable: true,
            exhausted: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
            events: None,
        }
    }

    pub fn with_event_log(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueTransport for MockTransport {
    async fn receive(&self) -> Result<Vec<QueueMessage>, MessagingError> {
        if self.exhausted.swap(true, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        if self.errorable {
            return Err(MessagingError::Receive("test consume error".to_string()));
        }
        Ok(std::mem::take(&mut *self.batch.lock().unwrap()))
    }

    async fn delete(&self, receipt: &str) -> Result<(), MessagingError> {
        self.deleted.lock().unwrap().push(receipt.to_string());
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("delete:{receipt}"));
        }
        Ok(())
    }
}

/// Reply sender that records every body it is given.
#[derive(Default)]
pub struct MockReplySender {
    messages: Mutex<Vec<String>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockReplySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_log(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_message(&self) -> String {
        self.messages.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ReplySender for MockReplySender {
    async fn send(&self, body: &str) -> Result<(), MessagingError> {
        self.messages.lock().unwrap().push(body.to_string());
        if let Some(events) = &self.events {
            events.lock().unwrap().push("reply".to_string());
        }
        Ok(())
    }
}

/// Verifier that passes the raw body through untouched.
pub struct PassthroughVerifier;

impl EnvelopeVerifier for PassthroughVerifier {
    fn verify(&self, message: &QueueMessage) -> Result<Vec<u8>, DispatchError> {
        Ok(message.body.clone().into_bytes())
    }
}

/// Observer that records `(message_id, rendered error)` pairs.
#[derive(Default)]
pub struct CapturingObserver {
    events: Mutex<Vec<(String, String)>>,
}

impl CapturingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl ErrorObserver for CapturingObserver {
    fn on_error(&self, message_id: &str, error: &(dyn std::error::Error + 'static)) {
        self.events.lock().unwrap().push((message_id.to_string(), error.to_string()));
    }
}

/// Handler that succeeds or fails with a fixed message, recording calls.
#[derive(Default)]
pub struct TestHandler {
    fail_with: Option<String>,
    pub invocations: AtomicUsize,
}

impl TestHandler {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), invocations: AtomicUsize::new(0) }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for TestHandler {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        _request: &Request,
    ) -> Result<(), HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(HandlerError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

/// Handler that tracks its own concurrency high-water mark.
#[derive(Default)]
pub struct ConcurrencyProbeHandler {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbeHandler {
    pub fn max_concurrency(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for ConcurrencyProbeHandler {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        _request: &Request,
    ) -> Result<(), HandlerError> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory object store keyed by `(bucket, key)`.
#[derive(Default)]
pub struct MockObjectStore {
    objects: HashMap<(String, String), Vec<u8>>,
    pub gets: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, key: &str, body: Vec<u8>) -> Self {
        self.objects.insert((bucket.to_string(), key.to_string()), body);
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let body = self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::Get {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "no such key".to_string(),
            })?;
        let size = body.len() as i64;
        Ok(ObjectStream { reader: Box::new(Cursor::new(body)), size: Some(size) })
    }
}

/// Job source returning a fixed minimal document.
pub struct StubJobSource;

impl JobSource for StubJobSource {
    fn job_for(&self, service: &str) -> Result<Job, ManifestError> {
        Ok(Job {
            id: Some(service.to_string()),
            name: service.to_string(),
            region: "eu".to_string(),
            datacenters: vec!["eu-west-1".to_string()],
            job_type: "service".to_string(),
            update: None,
            task_groups: Vec::new(),
        })
    }
}

/// A gzipped tar archive containing the given files.
pub fn tar_gz_archive(files: &[(&str, &str)]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Read a PGP fixture generated into `tests/fixtures/`.
pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("missing fixture {path}: {e}"))
}

/// Poll until `predicate` holds or the deadline passes.
pub async fn wait_until<F>(predicate: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !predicate() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
