//! Envelope and attribute types.
//!
//! An [`Envelope`] is one addressed, typed message unit: attributes plus an
//! opaque payload. Envelopes are immutable once constructed and handed off by
//! value — the producer gives up ownership on send, the consumer takes
//! ownership on receive.
//!
//! # Addressing invariants
//!
//! | Kind | Must carry | Must not carry |
//! |------|-----------|----------------|
//! | `Publish` | `source` (the topic) | `reqid` |
//! | `Request` | `id`, `sink` (the method) | — |
//! | `Response` | `reqid` (the answered request's `id`) | — |
//!
//! Enforced by [`Attributes::validate`], which the transport calls on every
//! send.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Uri;

// ============================================================================
// MessageKind
// ============================================================================

/// Message type discriminator.
///
/// Unknown wire values decode to [`MessageKind::Unspecified`] so that a
/// single unrecognized frame is discarded instead of killing the dispatch
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Fire-and-forget publication to a topic.
    Publish,
    /// RPC request addressed to a method.
    Request,
    /// RPC response carrying the request's id as `reqid`.
    Response,
    /// Unknown or missing type.
    #[serde(other)]
    Unspecified,
}

// ============================================================================
// Priority
// ============================================================================

/// Delivery priority hint.
///
/// Carried verbatim; the transport itself does not reorder frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background traffic.
    Low,
    /// Default priority.
    #[default]
    Standard,
    /// Latency-sensitive traffic.
    High,
    /// Safety-relevant traffic.
    Critical,
}

// ============================================================================
// Attributes
// ============================================================================

/// Addressing and control metadata of an envelope.
///
/// Constructed through the kind-specific constructors, which fill the fields
/// each message kind requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Unique id of this message; correlation key for requests.
    pub id: RequestId,

    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Origin address: the topic of a publish, the reply-to of a request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Uri>,

    /// Destination address: the method of a request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Uri>,

    /// Delivery priority hint.
    #[serde(default)]
    pub priority: Priority,

    /// Time-to-live; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "ttl_millis")]
    pub ttl: Option<Duration>,

    /// Id of the request this message answers; responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reqid: Option<RequestId>,
}

impl Attributes {
    /// Creates attributes for a publish message on `source`.
    #[must_use]
    pub fn publish(source: Uri) -> Self {
        Self {
            id: RequestId::generate(),
            kind: MessageKind::Publish,
            source: Some(source),
            sink: None,
            priority: Priority::default(),
            ttl: None,
            reqid: None,
        }
    }

    /// Creates attributes for a request to the method `sink`.
    ///
    /// `reply_to` is the caller's own address, stamped as `source` so the
    /// callee can address a notification back; correlation itself runs on
    /// `reqid`, not on the reply-to.
    #[must_use]
    pub fn request(sink: Uri, reply_to: Option<Uri>, ttl: Option<Duration>) -> Self {
        Self {
            id: RequestId::generate(),
            kind: MessageKind::Request,
            source: reply_to,
            sink: Some(sink),
            priority: Priority::default(),
            ttl,
            reqid: None,
        }
    }

    /// Creates attributes answering `request`.
    ///
    /// The response travels the reverse path: its `source` is the invoked
    /// method, its `sink` the requester's reply-to, and its `reqid` the
    /// request's `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `request` is not a request.
    pub fn response_to(request: &Attributes) -> Result<Self> {
        if request.kind != MessageKind::Request {
            return Err(Error::invalid_argument(format!(
                "cannot respond to a {:?} message",
                request.kind
            )));
        }
        Ok(Self {
            id: RequestId::generate(),
            kind: MessageKind::Response,
            source: request.sink.clone(),
            sink: request.source.clone(),
            priority: request.priority,
            ttl: request.ttl,
            reqid: Some(request.id),
        })
    }

    /// Sets the priority.
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Validates the invariants of this message kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] describing the first violated
    /// invariant.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            MessageKind::Publish => {
                let Some(source) = &self.source else {
                    return Err(Error::invalid_argument("publish requires a source topic"));
                };
                if source.has_wildcard() {
                    return Err(Error::invalid_argument(format!(
                        "publish topic must not contain wildcards: {source}"
                    )));
                }
                if self.reqid.is_some() {
                    return Err(Error::invalid_argument("publish must not carry a reqid"));
                }
                Ok(())
            }
            MessageKind::Request => {
                let Some(sink) = &self.sink else {
                    return Err(Error::invalid_argument("request requires a sink method"));
                };
                if sink.has_wildcard() {
                    return Err(Error::invalid_argument(format!(
                        "request sink must not contain wildcards: {sink}"
                    )));
                }
                Ok(())
            }
            MessageKind::Response => {
                if self.reqid.is_none() {
                    return Err(Error::invalid_argument("response requires a reqid"));
                }
                Ok(())
            }
            MessageKind::Unspecified => {
                Err(Error::invalid_argument("message kind is unspecified"))
            }
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One addressed, typed message unit: attributes plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Addressing and control metadata.
    pub attributes: Attributes,

    /// Opaque payload bytes.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope from attributes and payload.
    #[inline]
    #[must_use]
    pub fn new(attributes: Attributes, payload: Vec<u8>) -> Self {
        Self {
            attributes,
            payload,
        }
    }

    /// Creates a publish envelope on `source`.
    #[inline]
    #[must_use]
    pub fn publish(source: Uri, payload: Vec<u8>) -> Self {
        Self::new(Attributes::publish(source), payload)
    }

    /// Creates a request envelope to the method `sink`.
    #[inline]
    #[must_use]
    pub fn request(
        sink: Uri,
        reply_to: Option<Uri>,
        ttl: Option<Duration>,
        payload: Vec<u8>,
    ) -> Self {
        Self::new(Attributes::request(sink, reply_to, ttl), payload)
    }

    /// Creates a response envelope answering `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `request` is not a request.
    pub fn response_to(request: &Envelope, payload: Vec<u8>) -> Result<Self> {
        Ok(Self::new(
            Attributes::response_to(&request.attributes)?,
            payload,
        ))
    }

    /// Returns the message kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.attributes.kind
    }

    /// Returns the message id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.attributes.id
    }

    /// Returns the source URI, if any.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&Uri> {
        self.attributes.source.as_ref()
    }

    /// Returns the sink URI, if any.
    #[inline]
    #[must_use]
    pub fn sink(&self) -> Option<&Uri> {
        self.attributes.sink.as_ref()
    }

    /// Returns the correlated request id, if any.
    #[inline]
    #[must_use]
    pub fn reqid(&self) -> Option<RequestId> {
        self.attributes.reqid
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// TTL as integer milliseconds on the wire.
mod ttl_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ttl: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(duration) => serializer.serialize_u64(duration.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Payload as standard base64 on the wire.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::de::Error as DeError;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(DeError::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).expect("valid uri")
    }

    #[test]
    fn test_publish_attributes() {
        let attrs = Attributes::publish(uri("vehicle/door/status"));
        assert_eq!(attrs.kind, MessageKind::Publish);
        assert_eq!(attrs.source, Some(uri("vehicle/door/status")));
        assert!(attrs.reqid.is_none());
        attrs.validate().expect("valid publish");
    }

    #[test]
    fn test_publish_rejects_wildcard_topic() {
        let mut attrs = Attributes::publish(uri("vehicle/door/status"));
        attrs.source = Some(Uri::any());
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_publish_rejects_reqid() {
        let mut attrs = Attributes::publish(uri("vehicle/door/status"));
        attrs.reqid = Some(RequestId::generate());
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_request_attributes() {
        let attrs = Attributes::request(
            uri("service/echo/invoke"),
            Some(uri("client/reply")),
            Some(Duration::from_millis(200)),
        );
        assert_eq!(attrs.kind, MessageKind::Request);
        assert_eq!(attrs.sink, Some(uri("service/echo/invoke")));
        assert_eq!(attrs.ttl, Some(Duration::from_millis(200)));
        attrs.validate().expect("valid request");
    }

    #[test]
    fn test_request_requires_sink() {
        let mut attrs = Attributes::request(uri("service/echo/invoke"), None, None);
        attrs.sink = None;
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_response_reverses_addressing() {
        let request = Attributes::request(uri("service/echo/invoke"), Some(uri("client/reply")), None);
        let response = Attributes::response_to(&request).expect("response");

        assert_eq!(response.kind, MessageKind::Response);
        assert_eq!(response.reqid, Some(request.id));
        assert_eq!(response.source, Some(uri("service/echo/invoke")));
        assert_eq!(response.sink, Some(uri("client/reply")));
        response.validate().expect("valid response");
    }

    #[test]
    fn test_response_to_non_request_fails() {
        let publish = Attributes::publish(uri("vehicle/door/status"));
        assert!(Attributes::response_to(&publish).is_err());
    }

    #[test]
    fn test_response_requires_reqid() {
        let request = Attributes::request(uri("service/echo/invoke"), None, None);
        let mut response = Attributes::response_to(&request).expect("response");
        response.reqid = None;
        assert!(response.validate().is_err());
    }

    #[test]
    fn test_unspecified_is_invalid() {
        let mut attrs = Attributes::publish(uri("a"));
        attrs.kind = MessageKind::Unspecified;
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_kind_decodes_unknown_as_unspecified() {
        let kind: MessageKind = serde_json::from_str("\"notification\"").expect("parse");
        assert_eq!(kind, MessageKind::Unspecified);
    }

    #[test]
    fn test_envelope_accessors() {
        let envelope = Envelope::publish(uri("vehicle/door/status"), b"open".to_vec());
        assert_eq!(envelope.kind(), MessageKind::Publish);
        assert_eq!(envelope.source(), Some(&uri("vehicle/door/status")));
        assert_eq!(envelope.sink(), None);
        assert_eq!(envelope.reqid(), None);
        assert_eq!(envelope.payload, b"open");
    }

    #[test]
    fn test_envelope_response_to() {
        let request = Envelope::request(uri("service/echo/invoke"), None, None, b"ping".to_vec());
        let response = Envelope::response_to(&request, b"pong".to_vec()).expect("response");
        assert_eq!(response.reqid(), Some(request.id()));
        assert_eq!(response.payload, b"pong");
    }

    #[test]
    fn test_attributes_serde_skips_absent_fields() {
        let attrs = Attributes::publish(uri("vehicle/door/status"));
        let json = serde_json::to_string(&attrs).expect("serialize");
        assert!(json.contains("\"type\":\"publish\""));
        assert!(!json.contains("sink"));
        assert!(!json.contains("reqid"));
        assert!(!json.contains("ttl"));
    }

    #[test]
    fn test_ttl_serde_millis() {
        let attrs = Attributes::request(uri("a/b"), None, Some(Duration::from_millis(1500)));
        let json = serde_json::to_string(&attrs).expect("serialize");
        assert!(json.contains("\"ttl\":1500"));

        let back: Attributes = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.ttl, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_payload_serde_base64() {
        let envelope = Envelope::publish(uri("a"), vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&envelope).expect("serialize");
        assert!(json.contains("\"payload\":\"3q2+7w==\""));

        let back: Envelope = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.payload, vec![0xde, 0xad, 0xbe, 0xef]);
    }
}
