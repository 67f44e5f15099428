//! HTTP endpoint handlers.
//!
//! The send handler only:
//! 1. Ensures the shared session is usable, re-establishing it if not
//! 2. Publishes the message persistently
//! 3. Returns the confirmation or a summarized error
//!
//! Broker errors never surface raw to callers, only a detail string and a
//! 500 status.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::queue::{publisher, Message, Session, SessionManager};
use crate::Config;
use crate::PublishError;

/// Shared application state.
///
/// One session serves all requests; the mutex serializes access to its
/// channel, so a reconnect-then-publish sequence is atomic with respect to
/// other requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<SessionManager>,
    pub session: Arc<Mutex<Option<Session>>>,
}

impl AppState {
    pub fn new(config: Config, manager: SessionManager, session: Option<Session>) -> Self {
        Self {
            config: Arc::new(config),
            manager: Arc::new(manager),
            session: Arc::new(Mutex::new(session)),
        }
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Liveness response.
#[derive(Serialize)]
pub struct LivenessResponse {
    pub message: &'static str,
}

/// Liveness endpoint; no broker interaction.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        message: "API de mensageria rodando",
    })
}

// =============================================================================
// Send
// =============================================================================

/// Success response for a sent message.
#[derive(Serialize)]
pub struct SendResponse {
    pub status: &'static str,
    #[serde(rename = "mensagem")]
    pub message: Message,
}

/// Error response with a summarized detail string.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

fn service_unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: "Serviço de mensageria indisponível.".to_string(),
        }),
    )
        .into_response()
}

/// Send endpoint.
///
/// Accepts `{"nome": ..., "texto": ...}` and publishes it to the durable
/// queue. When the shared session is missing or unusable the handler asks
/// the session manager for a fresh one before publishing; if that fails the
/// request is answered 500 without contacting the broker further.
pub async fn send_message(
    State(state): State<AppState>,
    Json(message): Json<Message>,
) -> Response {
    info!(
        nome = %message.name,
        texto_length = message.text.len(),
        "send_request_received"
    );

    let mut slot = state.session.lock().await;

    // Re-establish the session if it is missing or no longer usable.
    if !slot.as_ref().is_some_and(Session::is_usable) {
        warn!("session_unusable_reconnecting");

        if let Some(stale) = slot.take() {
            state.manager.close(stale).await;
        }

        match state.manager.connect().await {
            Ok(fresh) => *slot = Some(fresh),
            Err(e) => {
                error!(error = %e, "session_reconnect_failed");
                return service_unavailable();
            }
        }
    }

    let session = match slot.as_ref() {
        Some(session) => session,
        None => return service_unavailable(),
    };

    match publisher::publish(session, &message).await {
        Ok(()) => {
            info!(nome = %message.name, "send_request_published");
            (
                StatusCode::OK,
                Json(SendResponse {
                    status: "mensagem enviada",
                    message,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "send_request_publish_failed");

            // A transport-level failure leaves the session unusable; drop it
            // so the next request reconnects through the manager.
            if matches!(e, PublishError::Broker(_)) {
                if let Some(stale) = slot.take() {
                    state.manager.close(stale).await;
                }
            }

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: format!("Erro ao enviar mensagem: {}", e),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_response_wire_shape() {
        let response = SendResponse {
            status: "mensagem enviada",
            message: Message::new("Ana", "ola"),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"status":"mensagem enviada","mensagem":{"nome":"Ana","texto":"ola"}}"#
        );
    }

    #[test]
    fn test_error_response_wire_shape() {
        let response = ErrorResponse {
            detail: "Serviço de mensageria indisponível.".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"detail":"Serviço de mensageria indisponível."}"#);
    }

    #[test]
    fn test_liveness_response_wire_shape() {
        let response = LivenessResponse {
            message: "API de mensageria rodando",
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"message":"API de mensageria rodando"}"#);
    }
}
