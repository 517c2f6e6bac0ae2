//! Uplink Transport - pub/sub + RPC messaging over a single dispatcher connection.
//!
//! This library maintains exactly one outbound TCP connection to a message
//! dispatcher and multiplexes an arbitrary number of topic subscriptions and
//! in-flight RPC calls over it.
//!
//! # Architecture
//!
//! The transport follows a client-dispatcher model:
//!
//! - **Local end (this crate)**: publishes, subscribes, and invokes methods
//!   over one framed socket
//! - **Remote end (dispatcher)**: fans frames out to every connected
//!   transport instance
//!
//! Key design principles:
//!
//! - Each [`SocketTransport`] owns: one TCP connection + one dispatch loop
//! - Explicit length-prefixed framing (one frame == one [`Envelope`])
//! - Addressing by structural equality ([`Uri`] values, never identity)
//! - Explicit instances behind the [`Transport`] trait (no global singleton)
//!
//! # Quick Start
//!
//! ```no_run
//! use uplink_transport::{CallOptions, Envelope, Result, SocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to a running dispatcher
//!     let transport = SocketTransport::builder()
//!         .endpoint("127.0.0.1:44444")
//!         .source("device.alpha/agent".parse()?)
//!         .build()
//!         .await?;
//!
//!     // Publish to a topic
//!     let topic = "vehicle/door/status".parse()?;
//!     transport.send(Envelope::publish(topic, b"open".to_vec())).await?;
//!
//!     // Invoke a remote method and await its response
//!     let method = "service/echo/invoke".parse()?;
//!     let response = transport
//!         .invoke_method(method, b"ping".to_vec(), CallOptions::default())
//!         .await?;
//!     println!("response payload: {:?}", response.payload);
//!
//!     transport.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatcher`] | In-process dispatcher server for integration scenarios |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope, URI, and codec types |
//! | [`transport`] | The transport layer (internal machinery + facade) |
//!
//! # Guarantees
//!
//! - **Ordered delivery**: frames dispatch in strict arrival order; listeners
//!   for one envelope run in registration order
//! - **At-most-once resolution**: a pending call completes exactly once,
//!   whether by response, deadline, or connection closure
//! - **Fail-fast closure**: connection loss fails outstanding calls
//!   immediately instead of letting each wait out its deadline

// ============================================================================
// Modules
// ============================================================================

/// In-process dispatcher server.
///
/// A frame-flooding fan-out peer, used to run conformance and integration
/// scenarios without an external process.
pub mod dispatcher;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for transport entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Protocol message types and frame codec.
///
/// Envelope, attributes, addressing URIs, and the wire codec.
pub mod protocol;

/// Transport layer.
///
/// Connection, registry, correlation, dispatch loop, and the
/// [`SocketTransport`] facade.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Dispatcher
pub use dispatcher::Dispatcher;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::RequestId;

// Protocol types
pub use protocol::{Attributes, Envelope, MessageKind, Priority, Uri, UriFilter};

// Transport types
pub use transport::{
    CallOptions, DEFAULT_CALL_TIMEOUT, Listener, SocketTransport, SocketTransportBuilder,
    Transport,
};
