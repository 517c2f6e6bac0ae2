//! Frame codec: envelope to/from one frame body.
//!
//! The codec is self-describing: one frame body is one JSON-encoded
//! [`Envelope`] (attributes inline, payload as base64). Framing itself — the
//! length prefix that delimits bodies on the stream — lives in the connection
//! layer; the codec only sees complete bodies.
//!
//! # Wire Body
//!
//! ```json
//! {
//!   "attributes": {
//!     "id": "uuid",
//!     "type": "publish",
//!     "source": "vehicle/door/status",
//!     "priority": "standard"
//!   },
//!   "payload": "base64"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

use super::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Maximum encoded frame body length in bytes.
///
/// Bounds the allocation a single inbound length prefix can demand.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Length prefix size on the wire: `u32`, big-endian.
pub const LEN_PREFIX_LEN: usize = 4;

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encodes an envelope into one frame body.
///
/// # Errors
///
/// - [`Error::Json`] if serialization fails
/// - [`Error::FrameTooLarge`] if the body exceeds [`MAX_FRAME_LEN`]
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(envelope)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::frame_too_large(body.len(), MAX_FRAME_LEN));
    }
    Ok(body)
}

/// Decodes one frame body into an envelope.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body is not a structurally valid
/// envelope. Callers treat this as fatal for the connection: a body that
/// fails to parse means the stream is corrupted or the peer speaks a
/// different protocol.
pub fn decode(body: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(body).map_err(|e| Error::decode(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
