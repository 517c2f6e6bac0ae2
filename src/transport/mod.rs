//! Transport layer: one connection, multiplexed subscriptions and calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐                ┌──────────────┐
//! │  SocketTransport             │                │  Dispatcher  │
//! │                              │      TCP       │              │
//! │  writer ───────────────────────────────────►  │  (remote     │
//! │                              │  length-       │   peer)      │
//! │  dispatch loop ◄──────────────────────────────│              │
//! │    │        │                │  prefixed      └──────────────┘
//! │    ▼        ▼                │  frames
//! │  registry  correlation       │
//! │  (topics)  (pending calls)   │
//! └──────────────────────────────┘
//! ```
//!
//! One transport owns exactly one connection. Outbound envelopes go through
//! the writer under a single lock; the background dispatch loop reads
//! inbound frames and routes publishes/requests to registered listeners and
//! responses to pending calls.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Framed TCP connection (read/write halves) |
//! | `correlation` | Pending RPC calls keyed by request id |
//! | `dispatch` | Background frame classification and routing |
//! | `registry` | Listener trait and subscription registry |
//! | `socket` | The socket-backed transport facade |

// ============================================================================
// Submodules
// ============================================================================

/// Framed TCP connection to the dispatcher.
pub mod connection;

/// Correlation table for in-flight RPC calls.
pub mod correlation;

/// Background dispatch loop.
mod dispatch;

/// Listener trait and subscription registry.
pub mod registry;

/// Socket-backed transport facade.
pub mod socket;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{Envelope, Uri};

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, FrameReader, FrameWriter};
pub use correlation::{CorrelationTable, PendingCall};
pub use registry::{Listener, ListenerRef, ListenerRegistry};
pub use socket::{CallOptions, DEFAULT_CALL_TIMEOUT, SocketTransport, SocketTransportBuilder};

// ============================================================================
// Transport
// ============================================================================

/// The transport surface consumed by command-glue layers.
///
/// Abstracting the facade behind a trait keeps collaborators decoupled from
/// the socket-backed implementation: tests substitute an in-memory double,
/// and two independent transports can coexist in one process — there is no
/// process-wide singleton.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Validates and sends an envelope.
    async fn send(&self, envelope: Envelope) -> Result<()>;

    /// Registers `listener` for an exact topic.
    fn register_listener(&self, topic: &Uri, listener: Arc<dyn Listener>) -> Result<()>;

    /// Removes one registration of `listener` under `topic`.
    fn unregister_listener(&self, topic: &Uri, listener: &Arc<dyn Listener>) -> Result<()>;

    /// Invokes a remote method and awaits its response.
    async fn invoke_method(
        &self,
        method: Uri,
        payload: Vec<u8>,
        options: CallOptions,
    ) -> Result<Envelope>;

    /// Closes the transport. Idempotent.
    async fn close(&self);
}
