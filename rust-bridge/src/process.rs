//! Processing step applied to each delivered message.
//!
//! Kept deliberately small: the delivery-guarantee logic lives in the
//! consumer loop, which maps this function's outcome to ack, requeue, or
//! drop. Anything slow or fallible that future handling needs (persistence,
//! notifications) belongs here, returning [`ProcessingError`] on transient
//! failure so the broker redelivers.

use tracing::info;

use crate::error::ProcessingError;
use crate::queue::Message;

/// Handle one delivered message.
///
/// Records the received message's fields. Errors returned here cause the
/// delivery to be rejected with requeue.
pub async fn handle_message(message: &Message) -> Result<(), ProcessingError> {
    info!(
        nome = %message.name,
        texto = %message.text,
        "message_received"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_message_succeeds() {
        let message = Message::new("Ana", "ola");
        assert!(handle_message(&message).await.is_ok());
    }
}
