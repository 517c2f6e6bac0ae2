//! Addressing URIs and subscription filters.
//!
//! A [`Uri`] is the addressing token for topics and methods: the `source` of a
//! publish envelope, the `sink` of a request envelope. Equality and hashing
//! are structural (value equality) — registries key on the canonical text, so
//! two independently parsed URIs for the same address always collide in a map.
//!
//! # Format
//!
//! One or more `/`-separated segments:
//!
//! ```text
//! vehicle/door/status
//! device.alpha/telemetry/engine_rpm
//! ```
//!
//! A segment may be the wildcard `*`, which matches any single segment when
//! the URI is used as a pattern. The single-segment URI `*` matches any URI
//! entirely. Exact (non-pattern) registrations reject wildcards.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Maximum canonical URI length in bytes.
pub const MAX_URI_LEN: usize = 256;

/// The wildcard segment.
const WILDCARD: &str = "*";

// ============================================================================
// Uri
// ============================================================================

/// A validated addressing URI.
///
/// Construct via [`Uri::parse`] or [`str::parse`]; both reject ill-formed
/// input, so a held `Uri` is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(String);

impl Uri {
    /// Parses and validates a URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the input is empty, exceeds
    /// [`MAX_URI_LEN`], contains an empty segment, or contains a character
    /// outside `[A-Za-z0-9_.~-]` (the wildcard `*` is only valid as a whole
    /// segment).
    pub fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();

        if input.is_empty() {
            return Err(Error::invalid_argument("URI must not be empty"));
        }
        if input.len() > MAX_URI_LEN {
            return Err(Error::invalid_argument(format!(
                "URI exceeds {MAX_URI_LEN} bytes: {} bytes",
                input.len()
            )));
        }

        for segment in input.split('/') {
            Self::validate_segment(input, segment)?;
        }

        Ok(Self(input.to_owned()))
    }

    /// Returns the whole-URI wildcard `*`.
    ///
    /// As a pattern it matches any URI.
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self(WILDCARD.to_owned())
    }

    /// Returns the canonical text form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the whole-URI wildcard `*`.
    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Returns `true` if any segment is the wildcard `*`.
    #[inline]
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.segments().any(|s| s == WILDCARD)
    }

    /// Iterates the URI's segments.
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Matches this URI, used as a pattern, against a concrete URI.
    ///
    /// The whole-URI wildcard matches anything. Otherwise segment counts must
    /// be equal and each pattern segment must equal the candidate segment or
    /// be `*`.
    #[must_use]
    pub fn matches(&self, candidate: &Uri) -> bool {
        if self.is_any() {
            return true;
        }

        let mut pattern = self.segments();
        let mut concrete = candidate.segments();

        loop {
            match (pattern.next(), concrete.next()) {
                (None, None) => return true,
                (Some(p), Some(c)) => {
                    if p != WILDCARD && p != c {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    fn validate_segment(uri: &str, segment: &str) -> Result<()> {
        if segment.is_empty() {
            return Err(Error::invalid_argument(format!(
                "URI has an empty segment: {uri:?}"
            )));
        }
        if segment == WILDCARD {
            return Ok(());
        }
        if let Some(bad) = segment
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '~' | '-'))
        {
            return Err(Error::invalid_argument(format!(
                "URI segment {segment:?} contains invalid character {bad:?}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0
    }
}

// ============================================================================
// UriFilter
// ============================================================================

/// A subscription filter over the source and sink of an envelope.
///
/// Both patterns may contain wildcards. A filter accepts an envelope when its
/// source pattern accepts the envelope's source and its sink pattern (if any)
/// accepts the envelope's sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriFilter {
    /// Pattern matched against the envelope's `source`.
    pub source: Uri,
    /// Pattern matched against the envelope's `sink`; `None` means no
    /// constraint on the sink.
    pub sink: Option<Uri>,
}

impl UriFilter {
    /// Creates a filter over a source pattern only.
    #[inline]
    #[must_use]
    pub fn from_source(source: Uri) -> Self {
        Self { source, sink: None }
    }

    /// Creates a filter over a source and sink pattern pair.
    #[inline]
    #[must_use]
    pub fn new(source: Uri, sink: Uri) -> Self {
        Self {
            source,
            sink: Some(sink),
        }
    }

    /// Matches this filter against an envelope's addressing fields.
    ///
    /// An absent field is accepted only by the whole-URI wildcard (or, for
    /// the sink, by the absence of a sink pattern).
    #[must_use]
    pub fn accepts(&self, source: Option<&Uri>, sink: Option<&Uri>) -> bool {
        let source_ok = match source {
            Some(uri) => self.source.matches(uri),
            None => self.source.is_any(),
        };
        let sink_ok = match (&self.sink, sink) {
            (None, _) => true,
            (Some(pattern), Some(uri)) => pattern.matches(uri),
            (Some(pattern), None) => pattern.is_any(),
        };
        source_ok && sink_ok
    }
}

impl fmt::Display for UriFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sink {
            Some(sink) => write!(f, "{} -> {}", self.source, sink),
            None => write!(f, "{} -> _", self.source),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
