//! Publishing messages to the durable queue.
//!
//! One publish attempt per call, through a session borrowed from the
//! session manager. This module never reconnects: a caller holding an
//! unusable session gets [`PublishError::SessionUnavailable`] back and must
//! re-establish through the manager first, keeping a single reconnection
//! authority.

use lapin::{options::BasicPublishOptions, BasicProperties};
use tracing::info;

use crate::error::PublishError;
use crate::queue::{Message, Session};

/// Publish one message persistently to the session's queue.
///
/// The message goes to the default exchange with the queue name as routing
/// key, marked `delivery_mode = 2` so the broker stores it durably. The
/// publish confirmation future is awaited before returning; success means
/// the message was handed to the broker, not that any consumer processed it.
pub async fn publish(session: &Session, message: &Message) -> Result<(), PublishError> {
    if !session.is_usable() {
        return Err(PublishError::SessionUnavailable);
    }

    let body = encode(message)?;

    session
        .channel()
        .basic_publish(
            "",
            session.queue(),
            BasicPublishOptions::default(),
            &body,
            BasicProperties::default()
                .with_delivery_mode(2) // Persistent
                .with_content_type("application/json".into()),
        )
        .await?
        .await?;

    info!(
        queue = session.queue(),
        body_length = body.len(),
        "message_published"
    );

    Ok(())
}

/// Serialize a message to its wire form.
///
/// Encoding failure is permanent and is never retried.
fn encode(message: &Message) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_wire_body() {
        let message = Message::new("Ana", "ola");

        let body = encode(&message).unwrap();

        assert_eq!(body, br#"{"nome":"Ana","texto":"ola"}"#);
    }

    #[test]
    fn test_encode_keeps_unicode_text() {
        let message = Message::new("João", "olá, tudo bem?");

        let body = encode(&message).unwrap();
        let parsed: Message = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed, message);
    }
}
