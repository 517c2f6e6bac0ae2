//! Background dispatch loop.
//!
//! One loop runs per transport for the lifetime of its connection. It reads
//! frames in strict arrival order, classifies each by message kind, and
//! routes it:
//!
//! | Kind | Route |
//! |------|-------|
//! | `Publish` | registry lookup on `source`, listeners invoked in order |
//! | `Request` | registry lookup on `sink`, listeners invoked in order |
//! | `Response` | correlation table `resolve(reqid)` |
//! | `Unspecified` | discarded |
//!
//! Listeners for one envelope run sequentially on the loop's task, so
//! delivery order per topic matches arrival order.
//!
//! # States
//!
//! `Reading → Draining → Closed`. A clean end-of-stream, a read error, or a
//! structurally undecodable frame (stream assumed corrupted) all leave
//! `Reading`. Draining fails every outstanding call fast with
//! `ConnectionClosed` — callers observe closure immediately rather than
//! waiting out their deadlines. Closed is terminal; the connection is never
//! re-dialed.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};

use crate::protocol::{Envelope, MessageKind, codec};

use super::connection::FrameReader;
use super::correlation::CorrelationTable;
use super::registry::ListenerRegistry;

// ============================================================================
// DispatchState
// ============================================================================

/// Loop lifecycle states.
///
/// `Connecting` precedes the loop itself: the facade constructor establishes
/// the connection eagerly and fails fatally if it cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    /// Reading frames, one at a time.
    Reading,
    /// Read side done; failing outstanding calls.
    Draining,
    /// Terminal.
    Closed,
}

// ============================================================================
// DispatchLoop
// ============================================================================

/// The background task driving one connection's inbound traffic.
pub(crate) struct DispatchLoop<R> {
    reader: FrameReader<R>,
    registry: Arc<ListenerRegistry>,
    correlation: Arc<CorrelationTable>,
    closed: Arc<AtomicBool>,
}

impl<R: AsyncRead + Unpin> DispatchLoop<R> {
    /// Creates a loop over a connection's read half.
    ///
    /// `closed` is shared with the facade: the loop raises it when it
    /// terminates so subsequent sends fail fast.
    pub(crate) fn new(
        reader: FrameReader<R>,
        registry: Arc<ListenerRegistry>,
        correlation: Arc<CorrelationTable>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            registry,
            correlation,
            closed,
        }
    }

    /// Runs until the connection ends.
    pub(crate) async fn run(mut self) {
        let mut state = DispatchState::Reading;

        while state == DispatchState::Reading {
            match self.reader.read_frame().await {
                Ok(Some(body)) => match codec::decode(&body) {
                    Ok(envelope) => self.route(envelope).await,
                    Err(e) => {
                        // One undecodable body means the stream framing can
                        // no longer be trusted.
                        warn!(error = %e, "undecodable frame, closing connection");
                        state = DispatchState::Draining;
                    }
                },
                Ok(None) => {
                    debug!("dispatcher closed the connection");
                    state = DispatchState::Draining;
                }
                Err(e) => {
                    warn!(error = %e, "frame read failed, closing connection");
                    state = DispatchState::Draining;
                }
            }
        }

        self.closed.store(true, Ordering::SeqCst);
        self.correlation.fail_all();
        state = DispatchState::Closed;

        debug!(?state, "dispatch loop terminated");
    }

    /// Routes one decoded envelope.
    async fn route(&self, envelope: Envelope) {
        match envelope.kind() {
            MessageKind::Publish | MessageKind::Request => self.deliver(envelope).await,
            MessageKind::Response => {
                let Some(reqid) = envelope.reqid() else {
                    warn!(id = %envelope.id(), "response without reqid discarded");
                    return;
                };
                if !self.correlation.resolve(&reqid, envelope) {
                    trace!(%reqid, "late or unmatched response discarded");
                }
            }
            MessageKind::Unspecified => {
                warn!(id = %envelope.id(), "frame with unknown message kind discarded");
            }
        }
    }

    /// Invokes every matched listener, in registration order.
    async fn deliver(&self, envelope: Envelope) {
        let matched = self.registry.lookup(&envelope.attributes);
        if matched.is_empty() {
            debug!(
                source = envelope.source().map(|u| u.as_str()).unwrap_or_default(),
                sink = envelope.sink().map(|u| u.as_str()).unwrap_or_default(),
                "no listeners matched, discarding"
            );
            return;
        }

        trace!(count = matched.len(), "delivering envelope");
        for entry in matched {
            entry.on_receive(envelope.clone()).await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
