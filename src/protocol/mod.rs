//! Protocol message types and frame codec.
//!
//! This module defines the message format exchanged with the dispatcher.
//!
//! # Protocol Overview
//!
//! | Message Kind | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Publish` | both | Fire-and-forget topic publication |
//! | `Request` | both | RPC request addressed to a method |
//! | `Response` | both | RPC response correlated by `reqid` |
//!
//! Every message is one [`Envelope`]: [`Attributes`] (addressing + control
//! metadata) plus an opaque payload. Addressing uses [`Uri`] values with
//! structural equality; subscriptions may use [`UriFilter`] patterns.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Envelope to/from frame body |
//! | `envelope` | Envelope, attributes, message kinds |
//! | `uri` | Addressing URIs and filters |

// ============================================================================
// Submodules
// ============================================================================

/// Frame codec: envelope to/from one frame body.
pub mod codec;

/// Envelope and attribute types.
pub mod envelope;

/// Addressing URIs and subscription filters.
pub mod uri;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{LEN_PREFIX_LEN, MAX_FRAME_LEN};
pub use envelope::{Attributes, Envelope, MessageKind, Priority};
pub use uri::{MAX_URI_LEN, Uri, UriFilter};
