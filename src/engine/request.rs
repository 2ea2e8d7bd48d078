//! The decoded request record.

use serde::Deserialize;

/// A verified, decoded request.
///
/// `id` is not transmitted on the wire; the engine injects the inbound
/// queue's message id after decoding. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Request {
    #[serde(rename = "Artifacts")]
    pub artifacts: Vec<String>,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Type")]
    pub message_type: String,
}
