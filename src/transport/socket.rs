//! Socket-backed transport facade.
//!
//! [`SocketTransport`] is the public entry point: it owns exactly one
//! connection to the dispatcher and multiplexes any number of topic
//! subscriptions and in-flight RPC calls over it. Outbound traffic goes
//! through a single writer lock; inbound traffic is driven by the background
//! dispatch loop spawned at construction.
//!
//! # Example
//!
//! ```ignore
//! use uplink_transport::{SocketTransport, CallOptions, Envelope};
//!
//! let transport = SocketTransport::builder()
//!     .endpoint("127.0.0.1:44444")
//!     .source("device.alpha/agent".parse()?)
//!     .build()
//!     .await?;
//!
//! let topic = "vehicle/door/status".parse()?;
//! transport.send(Envelope::publish(topic, b"open".to_vec())).await?;
//!
//! let method = "service/echo/invoke".parse()?;
//! let response = transport
//!     .invoke_method(method, b"ping".to_vec(), CallOptions::default())
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{Attributes, Envelope, Priority, Uri, UriFilter, codec};

use super::Transport;
use super::connection::{Connection, FrameWriter};
use super::correlation::CorrelationTable;
use super::dispatch::DispatchLoop;
use super::registry::{Listener, ListenerRegistry};

// ============================================================================
// Constants
// ============================================================================

/// Default RPC call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// CallOptions
// ============================================================================

/// Per-call options for [`SocketTransport::invoke_method`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    timeout: Option<Duration>,
    priority: Priority,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_CALL_TIMEOUT),
            priority: Priority::default(),
        }
    }
}

impl CallOptions {
    /// Creates options with the default timeout.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the call timeout.
    ///
    /// A zero duration means unbounded — the call then only completes on a
    /// response or connection closure.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Removes the timeout entirely.
    #[inline]
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the delivery priority.
    #[inline]
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// SocketTransportBuilder
// ============================================================================

/// Builder for configuring a [`SocketTransport`].
///
/// Use [`SocketTransport::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SocketTransportBuilder {
    /// Dispatcher endpoint, `host:port`.
    endpoint: Option<String>,
    /// Local address stamped as reply-to on requests.
    source: Option<Uri>,
}

impl SocketTransportBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dispatcher endpoint (`host:port`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the transport's own address, stamped as `source` on requests.
    #[inline]
    #[must_use]
    pub fn source(mut self, source: Uri) -> Self {
        self.source = Some(source);
        self
    }

    /// Connects and builds the transport.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no endpoint was set
    /// - [`Error::Connection`] if the dispatcher cannot be reached
    pub async fn build(self) -> Result<SocketTransport> {
        let endpoint = self.endpoint.ok_or_else(|| {
            Error::invalid_argument(
                "dispatcher endpoint is required. Use .endpoint(\"host:port\") to set it",
            )
        })?;
        SocketTransport::establish(&endpoint, self.source).await
    }
}

// ============================================================================
// SocketTransport
// ============================================================================

/// A transport instance owning exactly one dispatcher connection.
///
/// # Thread Safety
///
/// All methods are safe to call concurrently from arbitrary tasks. Writes
/// are serialized under a single writer lock so frames never interleave
/// byte-for-byte on the wire.
#[derive(Debug)]
pub struct SocketTransport {
    /// Local reply-to address for requests.
    source: Option<Uri>,
    /// Write half, single-writer discipline.
    writer: Mutex<FrameWriter<OwnedWriteHalf>>,
    /// Subscriptions (shared with the dispatch loop).
    registry: Arc<ListenerRegistry>,
    /// In-flight calls (shared with the dispatch loop).
    correlation: Arc<CorrelationTable>,
    /// Raised once the dispatch loop has terminated or `close` ran.
    closed: Arc<AtomicBool>,
    /// The dispatch loop task.
    dispatch_task: JoinHandle<()>,
    /// Dispatcher address.
    peer: SocketAddr,
}

impl SocketTransport {
    /// Returns a builder for configuring a transport.
    #[inline]
    #[must_use]
    pub fn builder() -> SocketTransportBuilder {
        SocketTransportBuilder::new()
    }

    /// Connects to a dispatcher with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the dispatcher cannot be reached.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        Self::establish(endpoint, None).await
    }

    /// Establishes the connection and spawns the dispatch loop.
    async fn establish(endpoint: &str, source: Option<Uri>) -> Result<Self> {
        let connection = Connection::connect(endpoint).await?;
        let peer = connection.peer_addr();
        let (reader, writer) = connection.split();

        let registry = Arc::new(ListenerRegistry::new());
        let correlation = Arc::new(CorrelationTable::new());
        let closed = Arc::new(AtomicBool::new(false));

        let dispatch = DispatchLoop::new(
            reader,
            Arc::clone(&registry),
            Arc::clone(&correlation),
            Arc::clone(&closed),
        );
        let dispatch_task = tokio::spawn(dispatch.run());

        info!(%peer, "transport connected");

        Ok(Self {
            source,
            writer: Mutex::new(writer),
            registry,
            correlation,
            closed,
            dispatch_task,
            peer,
        })
    }

    /// Returns the dispatcher's address.
    #[inline]
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the transport's own address, if configured.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&Uri> {
        self.source.as_ref()
    }

    /// Returns `true` once the connection is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of in-flight RPC calls.
    #[inline]
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.correlation.pending_count()
    }

    /// Validates and sends an envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the attributes violate their kind's
    ///   invariants
    /// - [`Error::ConnectionClosed`] after closure
    /// - [`Error::Internal`] on I/O failure; the connection should be
    ///   considered possibly-corrupted thereafter
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        envelope.attributes.validate()?;
        self.send_raw(envelope).await
    }

    /// Registers `listener` for an exact topic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for wildcard topics.
    pub fn register_listener(&self, topic: &Uri, listener: Arc<dyn Listener>) -> Result<()> {
        self.registry.register(topic, listener)
    }

    /// Removes one registration of `listener` under `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such registration exists.
    pub fn unregister_listener(&self, topic: &Uri, listener: &Arc<dyn Listener>) -> Result<()> {
        self.registry.unregister(topic, listener)
    }

    /// Registers `listener` for a source/sink filter pattern.
    pub fn register_filter_listener(
        &self,
        filter: UriFilter,
        listener: Arc<dyn Listener>,
    ) -> Result<()> {
        self.registry.register_filter(filter, listener)
    }

    /// Removes one registration of `listener` under `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such registration exists.
    pub fn unregister_filter_listener(
        &self,
        filter: &UriFilter,
        listener: &Arc<dyn Listener>,
    ) -> Result<()> {
        self.registry.unregister_filter(filter, listener)
    }

    /// Invokes the remote method `method` and awaits its response.
    ///
    /// Constructs a request with a fresh id, registers the pending call,
    /// sends, and starts a deadline watcher that expires the call if no
    /// response arrives in time. The returned future resolves with the
    /// response envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `method` contains wildcards
    /// - [`Error::RequestTimeout`] if the deadline fires first
    /// - [`Error::ConnectionClosed`] if the connection closes with the call
    ///   outstanding
    pub async fn invoke_method(
        &self,
        method: Uri,
        payload: Vec<u8>,
        options: CallOptions,
    ) -> Result<Envelope> {
        let attributes = Attributes::request(method, self.source.clone(), options.timeout)
            .with_priority(options.priority);
        attributes.validate()?;

        let request_id = attributes.id;
        let envelope = Envelope::new(attributes, payload);
        let call = self.correlation.begin_call(request_id)?;

        if let Err(e) = self.send_raw(envelope).await {
            // Never written to the wire; drop the slot silently.
            self.correlation.cancel(&request_id);
            return Err(e);
        }

        if let Some(timeout) = options.timeout {
            let correlation = Arc::clone(&self.correlation);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                correlation.expire(&request_id, timeout);
            });
        }

        call.wait().await
    }

    /// Closes the transport. Idempotent.
    ///
    /// Shuts down the socket, stops the dispatch loop, and fails all
    /// outstanding calls with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.writer.lock().await.shutdown().await;
        self.dispatch_task.abort();
        self.correlation.fail_all();

        debug!(peer = %self.peer, "transport closed");
    }

    async fn send_raw(&self, envelope: Envelope) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let body = codec::encode(&envelope)?;
        let mut writer = self.writer.lock().await;
        writer.write_frame(&body).await
    }
}

// ============================================================================
// Transport Impl
// ============================================================================

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, envelope: Envelope) -> Result<()> {
        SocketTransport::send(self, envelope).await
    }

    fn register_listener(&self, topic: &Uri, listener: Arc<dyn Listener>) -> Result<()> {
        SocketTransport::register_listener(self, topic, listener)
    }

    fn unregister_listener(&self, topic: &Uri, listener: &Arc<dyn Listener>) -> Result<()> {
        SocketTransport::unregister_listener(self, topic, listener)
    }

    async fn invoke_method(
        &self,
        method: Uri,
        payload: Vec<u8>,
        options: CallOptions,
    ) -> Result<Envelope> {
        SocketTransport::invoke_method(self, method, payload, options).await
    }

    async fn close(&self) {
        SocketTransport::close(self).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
