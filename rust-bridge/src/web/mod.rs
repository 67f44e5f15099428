//! Web module for the HTTP message-intake API.
//!
//! A thin surface over the queue: `POST /enviar` publishes one message to
//! the durable queue through the shared session, `GET /` answers liveness.
//! All delivery-guarantee logic lives in the queue module.

pub mod handlers;

pub use handlers::{
    liveness, send_message, AppState, ErrorResponse, LivenessResponse, SendResponse,
};
