//! Wire records for the inbound and outbound queues.

use serde::{Deserialize, Serialize};

/// A raw message consumed from the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Message body as delivered.
    pub body: String,
    /// Queue-assigned message id.
    pub id: String,
    /// Receipt handle used to delete the message.
    pub receipt: String,
}

/// Reply posted to the outbound queue after a message is handled.
///
/// Field order is part of the wire contract: `Error`, `ID`, `Success`.
/// `Error` is omitted entirely on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Success")]
    pub success: bool,
}

/// Error payload carried by a failure reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyError {
    /// Structured rendering of the error value.
    #[serde(rename = "Data")]
    pub data: serde_json::Value,
    /// Textual rendering of the error value.
    #[serde(rename = "Message")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_reply_omits_error() {
        let reply = Reply { error: None, id: "200".to_string(), success: true };

        let encoded = serde_json::to_string(&reply).unwrap();
        assert_eq!(encoded, r#"{"ID":"200","Success":true}"#);
    }

    #[test]
    fn failure_reply_field_order_is_stable() {
        let reply = Reply {
            error: Some(ReplyError {
                data: json!({"MessageType": "test"}),
                message: "missing handler for message".to_string(),
            }),
            id: "200".to_string(),
            success: false,
        };

        let encoded = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            encoded,
            r#"{"Error":{"Data":{"MessageType":"test"},"Message":"missing handler for message"},"ID":"200","Success":false}"#
        );
    }

    #[test]
    fn reply_round_trips() {
        let reply = Reply {
            error: Some(ReplyError {
                data: json!({"Offset": 1}),
                message: "unexpected end of JSON input".to_string(),
            }),
            id: "100".to_string(),
            success: false,
        };

        let encoded = serde_json::to_string(&reply).unwrap();
        let decoded: Reply = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn success_reply_decodes_without_error_field() {
        let decoded: Reply = serde_json::from_str(r#"{"ID":"200","Success":true}"#).unwrap();
        assert_eq!(decoded, Reply { error: None, id: "200".to_string(), success: true });
    }
}
