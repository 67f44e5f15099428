//! Queue message types and the queue name constant.
//!
//! The wire format is fixed by the existing producers and consumers of the
//! queue: a JSON object with exactly the `nome` and `texto` keys, published
//! to the durable `minha_fila` queue.

use serde::{Deserialize, Serialize};

/// Name of the durable queue the bridge publishes to and consumes from.
pub const QUEUE_NAME: &str = "minha_fila";

/// A message accepted over HTTP and carried through the queue.
///
/// Rust field names are English; the serialized keys keep the Portuguese
/// wire names (`nome`, `texto`) for compatibility. Both fields are required
/// on decode. Fields serialize in declaration order, so the encoded form is
/// reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender name
    #[serde(rename = "nome")]
    pub name: String,
    /// Message text
    #[serde(rename = "texto")]
    pub text: String,
}

impl Message {
    /// Create a new message.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip() {
        let message = Message::new("Ana", "ola");

        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, message);
    }

    #[test]
    fn test_message_round_trip_empty_fields() {
        let message = Message::new("", "");

        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, message);
    }

    #[test]
    fn test_message_uses_wire_field_names() {
        let message = Message::new("Ana", "ola");

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"nome":"Ana","texto":"ola"}"#);
    }

    #[test]
    fn test_message_decodes_wire_payload() {
        let parsed: Message = serde_json::from_str(r#"{"nome":"Maria","texto":"oi"}"#).unwrap();

        assert_eq!(parsed.name, "Maria");
        assert_eq!(parsed.text, "oi");
    }

    #[test]
    fn test_message_rejects_missing_field() {
        let result = serde_json::from_str::<Message>(r#"{"nome":"Ana"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_message_rejects_non_string_field() {
        let result = serde_json::from_str::<Message>(r#"{"nome":"Ana","texto":42}"#);
        assert!(result.is_err());
    }
}
