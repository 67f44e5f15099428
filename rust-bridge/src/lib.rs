//! Fila Bridge - HTTP to durable-queue message bridge.
//!
//! This library provides shared modules for the two binaries:
//! - `fila-api`: Thin HTTP API that accepts messages and publishes them
//! - `fila-consumer`: Worker that consumes, processes, and acknowledges them
//!
//! ## Architecture
//!
//! ```text
//! POST /enviar → fila-api → minha_fila (durable) → fila-consumer → ack/nack
//! ```
//!
//! Both binaries obtain their broker session from the same
//! [`queue::SessionManager`], the single authority for connecting,
//! reconnecting, and closing sessions.

pub mod config;
pub mod consumer;
pub mod error;
pub mod process;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConnectError, HandleError, ProcessingError, PublishError};
pub use queue::{Message, RetryPolicy, Session, SessionManager, QUEUE_NAME};
pub use web::AppState;
