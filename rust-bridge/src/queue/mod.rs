//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The message type and queue name shared by both binaries
//! - The session manager owning the connection + channel lifecycle
//! - The publisher
//!
//! ## Architecture
//!
//! ```text
//! fila-api → minha_fila queue → fila-consumer
//! ```

pub mod publisher;
pub mod session;
pub mod types;

pub use session::{RetryPolicy, Session, SessionManager};
pub use types::{Message, QUEUE_NAME};
