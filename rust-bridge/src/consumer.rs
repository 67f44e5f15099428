//! RabbitMQ consumer loop using lapin.
//!
//! This module handles obtaining a session from the session manager,
//! subscribing to the durable queue with manual acknowledgment, and applying
//! the processing step to each delivery in order. The outcome of handling
//! one delivery maps to exactly one of acknowledge, reject-with-requeue, or
//! reject-without-requeue:
//!
//! - decode failure → reject without requeue (a malformed body never gets
//!   better on redelivery)
//! - processing failure → reject with requeue (the broker redelivers)
//! - success → acknowledge
//!
//! On session loss the loop closes what is left of the session, reconnects,
//! and resubscribes; unacknowledged in-flight deliveries return to the
//! broker under its own redelivery policy. SIGINT/SIGTERM stop the loop at
//! the next delivery-wait boundary and release the session cleanly.

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions},
    types::FieldTable,
};
use tokio::signal;
use tracing::{error, info, warn};

use crate::error::{ConnectError, HandleError};
use crate::process::handle_message;
use crate::queue::{Message, Session, SessionManager};

/// Consumer tag reported to the broker.
const CONSUMER_TAG: &str = "fila-consumer";

/// What to do with a delivery after handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Handling succeeded: acknowledge.
    Ack,
    /// Transient failure: reject and let the broker redeliver.
    Requeue,
    /// Permanent failure: reject and drop.
    Drop,
}

/// Map a handling outcome to its disposition.
///
/// Decode errors are never retryable; every other handling error is
/// retryable by requeue. Pure, so the delivery-guarantee rule is testable
/// without a broker.
fn disposition(outcome: &Result<(), HandleError>) -> Disposition {
    match outcome {
        Ok(()) => Disposition::Ack,
        Err(HandleError::Decode(_)) => Disposition::Drop,
        Err(HandleError::Process(_)) => Disposition::Requeue,
    }
}

/// Decode one delivery body and run the processing step on it.
async fn handle_body(body: &[u8]) -> Result<(), HandleError> {
    let message: Message = serde_json::from_slice(body)?;
    handle_message(&message).await?;
    Ok(())
}

/// Run the consumer loop until shutdown.
///
/// This function:
/// 1. Obtains a session from the session manager (bounded retry)
/// 2. Subscribes to the queue with manual acknowledgment and prefetch 1
/// 3. Handles deliveries in order, acking or rejecting each by outcome
/// 4. Reconnects and resubscribes when the session drops
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
///
/// Returns an error only when a full connect attempt cycle is exhausted;
/// with no broker to serve it, the loop is fatal by design.
pub async fn run(config: crate::Config) -> Result<()> {
    let manager = SessionManager::new(
        config.amqp_url(),
        crate::queue::QUEUE_NAME,
        config.retry_policy(),
    );

    // Create shutdown signal future
    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    // Pin the shutdown future
    tokio::pin!(shutdown);

    loop {
        // Establish a session, bounded by the manager's retry budget.
        let session = tokio::select! {
            _ = &mut shutdown => {
                info!("consumer_stopping");
                return Ok(());
            }
            result = manager.connect() => {
                result.context("Broker unreachable, consumer cannot start")?
            }
        };

        let mut deliveries = match subscribe(&session).await {
            Ok(consumer) => consumer,
            Err(e) => {
                error!(error = %e, "consumer_subscribe_failed");
                manager.close(session).await;
                continue;
            }
        };

        info!(queue = session.queue(), "consumer_subscribed");

        // Pull deliveries until the session drops or shutdown is requested.
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("consumer_stopping");
                    manager.close(session).await;
                    return Ok(());
                }
                delivery = deliveries.next() => {
                    match delivery {
                        Some(Ok(delivery)) => handle_delivery(&session, delivery).await,
                        Some(Err(e)) => {
                            error!(error = %e, "consumer_transport_error");
                            break;
                        }
                        None => {
                            warn!("consumer_stream_closed");
                            break;
                        }
                    }
                }
            }
        }

        // Session lost: release what is left and reconnect.
        manager.close(session).await;
        warn!("consumer_session_lost_reconnecting");
    }
}

/// Register the subscription: manual acknowledgment, one in-flight delivery
/// at a time so deliveries are handled in broker order.
async fn subscribe(session: &Session) -> Result<lapin::Consumer, ConnectError> {
    let channel = session.channel();

    channel.basic_qos(1, BasicQosOptions::default()).await?;

    let consumer = channel
        .basic_consume(
            session.queue(),
            CONSUMER_TAG,
            BasicConsumeOptions {
                no_ack: false, // manual acknowledgment
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    Ok(consumer)
}

/// Handle one delivery and settle it with the broker.
///
/// Ack/nack failures are logged, not propagated: if the transport died the
/// next stream poll observes it and the loop reconnects, while the broker
/// redelivers anything left unacknowledged.
async fn handle_delivery(session: &Session, delivery: Delivery) {
    let delivery_tag = delivery.delivery_tag;

    info!(
        queue = session.queue(),
        delivery_tag,
        redelivered = delivery.redelivered,
        body_length = delivery.data.len(),
        "delivery_received"
    );

    let outcome = handle_body(&delivery.data).await;
    if let Err(e) = &outcome {
        error!(delivery_tag, error = %e, "delivery_handling_failed");
    }

    match disposition(&outcome) {
        Disposition::Ack => {
            if let Err(e) = session
                .channel()
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await
            {
                error!(delivery_tag, error = %e, "delivery_ack_failed");
            } else {
                info!(delivery_tag, "delivery_acked");
            }
        }
        Disposition::Requeue => {
            if let Err(e) = session
                .channel()
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    },
                )
                .await
            {
                error!(delivery_tag, error = %e, "delivery_requeue_failed");
            } else {
                warn!(delivery_tag, "delivery_requeued");
            }
        }
        Disposition::Drop => {
            if let Err(e) = session
                .channel()
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    },
                )
                .await
            {
                error!(delivery_tag, error = %e, "delivery_drop_failed");
            } else {
                warn!(delivery_tag, "delivery_dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;

    fn decode_error() -> HandleError {
        HandleError::Decode(serde_json::from_str::<Message>("{").unwrap_err())
    }

    #[test]
    fn test_disposition_ack_on_success() {
        assert_eq!(disposition(&Ok(())), Disposition::Ack);
    }

    #[test]
    fn test_disposition_drop_on_decode_failure() {
        let outcome = Err(decode_error());
        assert_eq!(disposition(&outcome), Disposition::Drop);
    }

    #[test]
    fn test_disposition_requeue_on_processing_failure() {
        let outcome = Err(HandleError::Process(ProcessingError::new("transient")));
        assert_eq!(disposition(&outcome), Disposition::Requeue);
    }

    #[tokio::test]
    async fn test_handle_body_accepts_wire_payload() {
        let outcome = handle_body(br#"{"nome":"Ana","texto":"ola"}"#).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_handle_body_classifies_malformed_body_as_decode() {
        let outcome = handle_body(b"not json at all").await;
        assert!(matches!(outcome, Err(HandleError::Decode(_))));
    }

    #[tokio::test]
    async fn test_handle_body_classifies_missing_field_as_decode() {
        let outcome = handle_body(br#"{"nome":"Ana"}"#).await;
        assert!(matches!(outcome, Err(HandleError::Decode(_))));
    }
}
