//! # deploy-worker
//!
//! A long-running deployment worker. It consumes clearsigned deployment and
//! secret-update requests from an inbound queue, verifies them against a
//! configured OpenPGP keyring, dispatches each to a typed handler, watches
//! the effect on Nomad until the rollout is terminal, and publishes a
//! success/failure reply on an outbound queue before acknowledging the
//! inbound message.
//!
//! ## Architecture
//!
//! - [`engine`] — the dispatch engine: receive loop, bounded in-flight
//!   pool, verify → decode → route → handle → reply → ack.
//! - [`messaging`] — the queue consumer, reply producer and wire records.
//! - [`handler`] — the deployment and secret handlers.
//! - [`nomad`] — Nomad API documents, HTTP client and the job builder.
//! - [`crypto`], [`storage`], [`vault`] — keyrings and the object/secret
//!   store capabilities.
//! - [`resilience`] — the cancellable backoff retry used around reply and
//!   acknowledge.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod engine;
pub mod handler;
pub mod logging;
pub mod messaging;
pub mod nomad;
pub mod resilience;
pub mod storage;
pub mod vault;
pub mod web;

pub use config::Config;
pub use engine::{Engine, EngineConfig, HandlerRegistry};
