//! Queue transport: inbound consumer, outbound reply producer and the wire
//! records shared between them.

pub mod consumer;
pub mod errors;
pub mod message;
pub mod producer;

pub use consumer::{Consumer, ConsumerChannels, QueueTransport, SqsTransport};
pub use errors::MessagingError;
pub use message::{QueueMessage, Reply, ReplyError};
pub use producer::{ReplySender, SqsReplyProducer};
