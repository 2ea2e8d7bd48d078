//! End-to-end dispatch engine scenarios: transport errors, undecodable and
//! unrouteable payloads, handler outcomes, envelope verification, the
//! reply-before-ack ordering and the in-flight bound.

mod common;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use deploy_worker::engine::{ClearsignVerifier, Engine, EngineConfig, HandlerRegistry};
use deploy_worker::messaging::QueueMessage;

use common::*;

struct Scenario {
    producer: Arc<MockReplySender>,
    observer: Arc<CapturingObserver>,
    transport: Arc<MockTransport>,
    shutdown: CancellationToken,
    run: tokio::task::JoinHandle<()>,
}

impl Scenario {
    fn start(
        transport: MockTransport,
        verifier: impl deploy_worker::engine::EnvelopeVerifier + 'static,
        handlers: HandlerRegistry,
    ) -> Self {
        Self::start_with(transport, MockReplySender::new(), verifier, handlers)
    }

    fn start_with(
        transport: MockTransport,
        producer: MockReplySender,
        verifier: impl deploy_worker::engine::EnvelopeVerifier + 'static,
        handlers: HandlerRegistry,
    ) -> Self {
        let producer = Arc::new(producer);
        let observer = Arc::new(CapturingObserver::new());
        let transport = Arc::new(transport);
        let engine = Arc::new(
            Engine::with_capabilities(
                engine_config(),
                transport.clone(),
                producer.clone(),
                Arc::new(verifier),
                observer.clone(),
                handlers,
            )
            .unwrap(),
        );

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(engine.run(shutdown.clone()));
        Self { producer, observer, transport, shutdown, run }
    }

    async fn finish(self) {
        self.shutdown.cancel();
        self.run.await.unwrap();
    }
}

#[test]
fn misconfigured_engines_are_rejected() {
    let cases = [
        (EngineConfig { consumer_queue: String::new(), ..engine_config() }, "missing consumer queue name"),
        (EngineConfig { consumer_queue_url: String::new(), ..engine_config() }, "missing consumer queue url"),
        (EngineConfig { producer_queue: String::new(), ..engine_config() }, "missing producer queue name"),
        (EngineConfig { region: String::new(), ..engine_config() }, "missing queue region"),
    ];

    for (config, expected) in cases {
        let err = Engine::with_capabilities(
            config,
            Arc::new(MockTransport::with_messages(Vec::new())),
            Arc::new(MockReplySender::new()),
            Arc::new(PassthroughVerifier),
            Arc::new(CapturingObserver::new()),
            HandlerRegistry::new(),
        )
        .err()
        .expect("expected a configuration error");
        assert_eq!(err.to_string(), expected);
    }
}

#[tokio::test]
async fn queue_errors_are_observed_and_produce_no_reply() {
    let scenario =
        Scenario::start(MockTransport::errorable(), PassthroughVerifier, HandlerRegistry::new());

    let observer = scenario.observer.clone();
    wait_until(move || !observer.events().is_empty()).await;

    let events = scenario.observer.events();
    assert_eq!(events[0].0, "");
    assert!(events[0].1.contains("test consume error"));
    assert_eq!(scenario.producer.last_message(), "");

    scenario.finish().await;
}

#[tokio::test]
async fn empty_bodies_reply_with_the_decode_error() {
    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message("", "100")]),
        PassthroughVerifier,
        HandlerRegistry::new(),
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(
        scenario.producer.last_message(),
        r#"{"Error":{"Data":{"Offset":1},"Message":"unexpected end of JSON input"},"ID":"100","Success":false}"#
    );
    scenario.finish().await;
}

#[tokio::test]
async fn unrouteable_types_reply_with_missing_handler() {
    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(r#"{"Type":"test"}"#, "200")]),
        PassthroughVerifier,
        HandlerRegistry::new(),
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(
        scenario.producer.last_message(),
        r#"{"Error":{"Data":{"MessageType":"test"},"Message":"missing handler for message"},"ID":"200","Success":false}"#
    );

    let events = scenario.observer.events();
    assert_eq!(events[0].0, "200");
    assert_eq!(events[0].1, "missing handler for message");

    scenario.finish().await;
}

#[tokio::test]
async fn handler_errors_reply_with_failure() {
    let mut handlers = HandlerRegistry::new();
    handlers.register("test", Arc::new(TestHandler::failing("test handler error")));

    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(r#"{"Type":"test"}"#, "200")]),
        PassthroughVerifier,
        handlers,
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(
        scenario.producer.last_message(),
        r#"{"Error":{"Data":{},"Message":"test handler error"},"ID":"200","Success":false}"#
    );
    scenario.finish().await;
}

#[tokio::test]
async fn successful_handlers_reply_success_and_ack() {
    let mut handlers = HandlerRegistry::new();
    handlers.register("test", Arc::new(TestHandler::succeeding()));

    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(r#"{"Type":"test"}"#, "200")]),
        PassthroughVerifier,
        handlers,
    );

    let transport = scenario.transport.clone();
    wait_until(move || !transport.deleted().is_empty()).await;

    assert_eq!(scenario.producer.last_message(), r#"{"ID":"200","Success":true}"#);
    assert_eq!(scenario.transport.deleted(), vec!["200".to_string()]);
    scenario.finish().await;
}

#[tokio::test]
async fn unsigned_bodies_reply_with_invalid_block_and_skip_the_handler() {
    let handler = Arc::new(TestHandler::succeeding());
    let mut handlers = HandlerRegistry::new();
    handlers.register("test", handler.clone());

    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(r#"{"Type":"test"}"#, "300")]),
        ClearsignVerifier::from_armored(&fixture("verification_key.asc")).unwrap(),
        handlers,
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(
        scenario.producer.last_message(),
        r#"{"Error":{"Data":{"MessageID":"300"},"Message":"invalid clearsign block for message"},"ID":"300","Success":false}"#
    );
    assert_eq!(handler.invocation_count(), 0);

    scenario.finish().await;
}

#[tokio::test]
async fn clearsigned_bodies_verify_and_route() {
    let handler = Arc::new(TestHandler::succeeding());
    let mut handlers = HandlerRegistry::new();
    handlers.register("test", handler.clone());

    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(&fixture("clearsigned_test.asc"), "400")]),
        ClearsignVerifier::from_armored(&fixture("verification_key.asc")).unwrap(),
        handlers,
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(scenario.producer.last_message(), r#"{"ID":"400","Success":true}"#);
    assert_eq!(handler.invocation_count(), 1);

    scenario.finish().await;
}

#[tokio::test]
async fn clearsigned_bodies_route_by_their_type_field() {
    // A verified secret request with no secret handler registered falls
    // through to the missing-handler reply.
    let scenario = Scenario::start(
        MockTransport::with_messages(vec![queue_message(
            &fixture("clearsigned_secret.asc"),
            "500",
        )]),
        ClearsignVerifier::from_armored(&fixture("verification_key.asc")).unwrap(),
        HandlerRegistry::new(),
    );

    let producer = scenario.producer.clone();
    wait_until(move || !producer.messages().is_empty()).await;

    assert_eq!(
        scenario.producer.last_message(),
        r#"{"Error":{"Data":{"MessageType":"secret"},"Message":"missing handler for message"},"ID":"500","Success":false}"#
    );
    scenario.finish().await;
}

#[tokio::test]
async fn reply_is_attempted_before_ack() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let transport =
        MockTransport::with_messages(vec![queue_message(r#"{"Type":"test"}"#, "200")])
            .with_event_log(events.clone());
    let producer = MockReplySender::new().with_event_log(events.clone());

    let mut handlers = HandlerRegistry::new();
    handlers.register("test", Arc::new(TestHandler::succeeding()));

    let scenario = Scenario::start_with(transport, producer, PassthroughVerifier, handlers);

    let transport = scenario.transport.clone();
    wait_until(move || !transport.deleted().is_empty()).await;

    let log = events.lock().unwrap().clone();
    assert_eq!(log, vec!["reply".to_string(), "delete:200".to_string()]);

    scenario.finish().await;
}

#[tokio::test]
async fn in_flight_handlers_stay_within_the_slot_bound() {
    let messages: Vec<QueueMessage> = (0..60)
        .map(|i| queue_message(r#"{"Type":"test"}"#, &i.to_string()))
        .collect();

    let probe = Arc::new(ConcurrencyProbeHandler::default());
    let mut handlers = HandlerRegistry::new();
    handlers.register("test", probe.clone());

    let scenario =
        Scenario::start(MockTransport::with_messages(messages), PassthroughVerifier, handlers);

    let producer = scenario.producer.clone();
    wait_until(move || producer.messages().len() == 60).await;

    assert!(
        probe.max_concurrency() <= 50,
        "in-flight high-water mark {} exceeded the slot bound",
        probe.max_concurrency()
    );
    assert!(probe.max_concurrency() > 1, "messages were not handled concurrently");

    scenario.finish().await;
}
