//! Correlation table for in-flight RPC calls.
//!
//! Maps an outstanding request id to a pending result slot. Each slot is
//! single-assignment: the first of `resolve` (response arrived) or `expire`
//! (deadline fired) removes the entry under the table lock and completes the
//! caller's future; the loser finds the entry gone and is a no-op. Removal
//! and completion never race because remove-if-present runs under the mutex.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Envelope;

// ============================================================================
// Types
// ============================================================================

/// Map of request ids to pending result slots.
type PendingMap = FxHashMap<RequestId, oneshot::Sender<Result<Envelope>>>;

// ============================================================================
// PendingCall
// ============================================================================

/// The caller's handle on an in-flight RPC call.
///
/// Await via [`wait`](Self::wait); resolves with the response envelope or
/// fails with [`Error::RequestTimeout`] / [`Error::ConnectionClosed`].
#[derive(Debug)]
pub struct PendingCall {
    request_id: RequestId,
    rx: oneshot::Receiver<Result<Envelope>>,
}

impl PendingCall {
    /// Returns the request id this call is keyed under.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Waits for the call to complete.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if the deadline fired first
    /// - [`Error::ConnectionClosed`] if the connection closed with the call
    ///   outstanding
    /// - [`Error::ChannelClosed`] if the slot was cancelled
    pub async fn wait(self) -> Result<Envelope> {
        self.rx.await?
    }
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Pending RPC calls keyed by request id.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<PendingMap>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pending slot for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on id collision. Ids are 128-bit
    /// random values, so this indicates id reuse by the caller, not a
    /// recoverable runtime condition.
    pub fn begin_call(&self, request_id: RequestId) -> Result<PendingCall> {
        let (tx, rx) = oneshot::channel();

        let mut pending = self.pending.lock();
        if pending.contains_key(&request_id) {
            return Err(Error::already_exists(request_id));
        }
        pending.insert(request_id, tx);

        trace!(%request_id, "call registered");
        Ok(PendingCall { request_id, rx })
    }

    /// Completes the pending slot for `request_id` with a response.
    ///
    /// Returns `false` (silently) if no call is pending under that id — the
    /// normal case for a late or duplicate response.
    pub fn resolve(&self, request_id: &RequestId, envelope: Envelope) -> bool {
        let Some(tx) = self.pending.lock().remove(request_id) else {
            return false;
        };

        trace!(%request_id, "call resolved");
        // The caller may have dropped its handle; nothing left to notify.
        let _ = tx.send(Ok(envelope));
        true
    }

    /// Fails the pending slot for `request_id` with a timeout.
    ///
    /// Returns `false` if the call already resolved — a timeout firing after
    /// resolution never overwrites the result.
    pub fn expire(&self, request_id: &RequestId, timeout: Duration) -> bool {
        let Some(tx) = self.pending.lock().remove(request_id) else {
            return false;
        };

        debug!(%request_id, timeout_ms = timeout.as_millis() as u64, "call expired");
        let _ = tx.send(Err(Error::request_timeout(
            *request_id,
            timeout.as_millis() as u64,
        )));
        true
    }

    /// Removes the pending slot without completing it.
    ///
    /// Used to clean up after a request that was never written to the wire.
    /// Returns `false` if no call is pending under that id.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        self.pending.lock().remove(request_id).is_some()
    }

    /// Fails every pending slot with [`Error::ConnectionClosed`].
    ///
    /// Called when the dispatch loop terminates, so callers observe closure
    /// immediately instead of waiting out their deadlines. Returns the
    /// number of calls failed.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "failed pending calls on closure");
        }
        count
    }

    /// Returns the number of in-flight calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
