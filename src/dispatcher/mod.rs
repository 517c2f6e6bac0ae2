//! In-process dispatcher server.
//!
//! The dispatcher is the remote peer a [`SocketTransport`] connects to: it
//! accepts any number of transport connections and floods every frame it
//! receives to **all** connected clients — including the sender. Routing is
//! each transport's job; the dispatcher is a dumb fan-out.
//!
//! Primarily used to run conformance and integration scenarios in-process:
//! bind to an ephemeral port, point transports at [`local_addr`], exchange
//! traffic, then [`shutdown`].
//!
//! ```text
//! transport A ──┐             ┌── transport A
//! transport B ──┼─► flood ────┼── transport B
//! transport C ──┘             └── transport C
//! ```
//!
//! [`SocketTransport`]: crate::transport::SocketTransport
//! [`local_addr`]: Dispatcher::local_addr
//! [`shutdown`]: Dispatcher::shutdown

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::transport::connection::{FrameReader, FrameWriter};

// ============================================================================
// Types
// ============================================================================

/// Per-client state held by the dispatcher.
struct ClientHandle {
    /// Frames queued for this client's writer task.
    frames_tx: mpsc::UnboundedSender<Vec<u8>>,
    /// The client's reader task.
    reader_task: JoinHandle<()>,
}

/// Connected clients keyed by peer address.
type ClientMap = Arc<RwLock<FxHashMap<SocketAddr, ClientHandle>>>;

// ============================================================================
// Dispatcher
// ============================================================================

/// A frame-flooding dispatcher server.
///
/// # Example
///
/// ```ignore
/// let dispatcher = Dispatcher::bind("127.0.0.1:0").await?;
/// let transport = SocketTransport::connect(&dispatcher.local_addr().to_string()).await?;
/// // ...
/// dispatcher.shutdown().await;
/// ```
pub struct Dispatcher {
    /// Bound address.
    local_addr: SocketAddr,
    /// Connected clients, shared with the accept loop and reader tasks.
    clients: ClientMap,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// The accept loop task.
    accept_task: JoinHandle<()>,
}

impl Dispatcher {
    /// Binds the dispatcher and starts its accept loop.
    ///
    /// Use port 0 to let the OS assign an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let clients: ClientMap = Arc::new(RwLock::new(FxHashMap::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_task = tokio::spawn(Self::accept_loop(
            listener,
            Arc::clone(&clients),
            Arc::clone(&shutdown),
        ));

        info!(%local_addr, "dispatcher listening");

        Ok(Self {
            local_addr,
            clients,
            shutdown,
            accept_task,
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the number of connected clients.
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Shuts the dispatcher down. Idempotent.
    ///
    /// Stops accepting, disconnects every client, and releases the port.
    /// Connected transports observe end-of-stream.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        self.accept_task.abort();

        let drained: Vec<ClientHandle> = {
            let mut clients = self.clients.write();
            clients.drain().map(|(_, handle)| handle).collect()
        };
        let count = drained.len();
        for handle in drained {
            handle.reader_task.abort();
            // Dropping frames_tx ends the writer task, which shuts the
            // socket's write side and signals EOF to the client.
        }

        debug!(count, "dispatcher shut down");
    }

    /// Accepts connections until aborted.
    async fn accept_loop(listener: TcpListener, clients: ClientMap, shutdown: Arc<AtomicBool>) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    Self::admit(stream, addr, &clients);
                }
                Err(e) => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Registers a new client and spawns its reader and writer tasks.
    fn admit(stream: TcpStream, addr: SocketAddr, clients: &ClientMap) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::write_loop(write_half, frames_rx));
        let reader_task = tokio::spawn(Self::read_loop(read_half, addr, Arc::clone(clients)));

        clients.write().insert(
            addr,
            ClientHandle {
                frames_tx,
                reader_task,
            },
        );

        debug!(%addr, "client connected");
    }

    /// Reads frames from one client and floods each to every client.
    async fn read_loop(read_half: OwnedReadHalf, addr: SocketAddr, clients: ClientMap) {
        let mut reader = FrameReader::new(read_half);

        loop {
            match reader.read_frame().await {
                Ok(Some(frame)) => Self::flood(&clients, &frame),
                Ok(None) => break,
                Err(e) => {
                    debug!(%addr, error = %e, "client read failed");
                    break;
                }
            }
        }

        if clients.write().remove(&addr).is_some() {
            debug!(%addr, "client disconnected");
        }
    }

    /// Drains queued frames onto one client's socket.
    async fn write_loop(write_half: OwnedWriteHalf, mut frames_rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        let mut writer = FrameWriter::new(write_half);

        while let Some(frame) = frames_rx.recv().await {
            if let Err(e) = writer.write_frame(&frame).await {
                debug!(error = %e, "client write failed");
                break;
            }
        }

        writer.shutdown().await;
    }

    /// Forwards one frame to every connected client, the sender included.
    fn flood(clients: &ClientMap, frame: &[u8]) {
        let snapshot: Vec<(SocketAddr, mpsc::UnboundedSender<Vec<u8>>)> = clients
            .read()
            .iter()
            .map(|(addr, handle)| (*addr, handle.frames_tx.clone()))
            .collect();

        let mut dead = Vec::new();
        for (addr, tx) in snapshot {
            if tx.send(frame.to_vec()).is_err() {
                dead.push(addr);
            }
        }

        if !dead.is_empty() {
            let mut clients = clients.write();
            for addr in dead {
                if let Some(handle) = clients.remove(&addr) {
                    handle.reader_task.abort();
                }
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Stop accepting; client tasks end once their sockets close.
        self.accept_task.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
