//! Listener trait and subscription registry.
//!
//! The registry maps addressing values to ordered sets of subscriber
//! callbacks. Two tiers exist:
//!
//! - **exact**: a non-wildcard topic URI keyed in a hash map — the fast path
//! - **filter**: source/sink patterns scanned linearly on every dispatch,
//!   since overlapping patterns admit no shortcut indexing; lookup cost is
//!   O(registered filters)
//!
//! Lookups are copy-on-read: they return a snapshot, so concurrent
//! registration or removal is never observed mid-iteration.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Attributes, Envelope, MessageKind, Uri, UriFilter};

// ============================================================================
// Listener
// ============================================================================

/// A subscriber callback invoked by the dispatch loop.
///
/// Implementations must be cheap or internally offload work: listeners for
/// one envelope run sequentially on the dispatch task, so a slow listener
/// delays everything behind it.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Called with each envelope routed to this listener.
    async fn on_receive(&self, envelope: Envelope);
}

// ============================================================================
// ListenerRef
// ============================================================================

/// A registered listener handle.
///
/// Identity is pointer identity of the underlying `Arc` — the same `Arc`
/// registered twice yields two distinct entries that both fire, and
/// unregistration removes exactly one entry for the `Arc` it is given.
#[derive(Clone)]
pub struct ListenerRef(Arc<dyn Listener>);

impl ListenerRef {
    /// Wraps a listener.
    #[inline]
    #[must_use]
    pub fn new(listener: Arc<dyn Listener>) -> Self {
        Self(listener)
    }

    /// Invokes the listener.
    #[inline]
    pub async fn on_receive(&self, envelope: Envelope) {
        self.0.on_receive(envelope).await;
    }

    /// Returns `true` if this entry wraps the given `Arc`.
    #[inline]
    #[must_use]
    pub fn is(&self, listener: &Arc<dyn Listener>) -> bool {
        Arc::ptr_eq(&self.0, listener)
    }
}

impl std::fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ListenerRef({:p})", Arc::as_ptr(&self.0))
    }
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Maps topics and filters to ordered subscriber sets.
///
/// All operations are safe to call concurrently with each other and with the
/// dispatch loop's lookups.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    /// Exact-topic tier: non-wildcard URI → listeners in registration order.
    topics: RwLock<FxHashMap<Uri, Vec<ListenerRef>>>,

    /// Filter tier: scanned in registration order on every dispatch.
    filters: RwLock<Vec<(UriFilter, ListenerRef)>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under an exact topic.
    ///
    /// Duplicate registration of the same listener appends a second entry;
    /// callers wanting exactly-once delivery must not double-register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `topic` contains wildcards —
    /// patterns belong in the filter tier.
    pub fn register(&self, topic: &Uri, listener: Arc<dyn Listener>) -> Result<()> {
        if topic.has_wildcard() {
            return Err(Error::invalid_argument(format!(
                "exact registration rejects wildcard topic {topic}; use a filter"
            )));
        }

        let mut topics = self.topics.write();
        topics
            .entry(topic.clone())
            .or_default()
            .push(ListenerRef::new(listener));

        debug!(%topic, "listener registered");
        Ok(())
    }

    /// Removes one entry for `listener` under `topic`.
    ///
    /// Removes the earliest matching entry only; if the topic's set becomes
    /// empty the topic itself is dropped, so the map never accumulates dead
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the topic has no listeners or the
    /// listener is not among them.
    pub fn unregister(&self, topic: &Uri, listener: &Arc<dyn Listener>) -> Result<()> {
        let mut topics = self.topics.write();

        let Some(entries) = topics.get_mut(topic) else {
            return Err(Error::not_found(format!(
                "no listeners registered for topic {topic}"
            )));
        };
        let Some(index) = entries.iter().position(|entry| entry.is(listener)) else {
            return Err(Error::not_found(format!(
                "listener not registered for topic {topic}"
            )));
        };

        entries.remove(index);
        if entries.is_empty() {
            topics.remove(topic);
        }

        debug!(%topic, "listener unregistered");
        Ok(())
    }

    /// Registers `listener` under a source/sink filter pattern.
    pub fn register_filter(&self, filter: UriFilter, listener: Arc<dyn Listener>) -> Result<()> {
        let mut filters = self.filters.write();
        debug!(%filter, "filter listener registered");
        filters.push((filter, ListenerRef::new(listener)));
        Ok(())
    }

    /// Removes one entry for `listener` under `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such filter/listener pair exists.
    pub fn unregister_filter(&self, filter: &UriFilter, listener: &Arc<dyn Listener>) -> Result<()> {
        let mut filters = self.filters.write();

        let Some(index) = filters
            .iter()
            .position(|(f, entry)| f == filter && entry.is(listener))
        else {
            return Err(Error::not_found(format!(
                "listener not registered for filter {filter}"
            )));
        };

        filters.remove(index);
        debug!(%filter, "filter listener unregistered");
        Ok(())
    }

    /// Returns the listeners matching an envelope's routing key.
    ///
    /// Publish envelopes route by `source`, requests by `sink`; responses
    /// and unspecified kinds never match. Exact matches come first in
    /// registration order, then filter matches in registration order. The
    /// returned set is a snapshot.
    #[must_use]
    pub fn lookup(&self, attributes: &Attributes) -> Vec<ListenerRef> {
        let key = match attributes.kind {
            MessageKind::Publish => attributes.source.as_ref(),
            MessageKind::Request => attributes.sink.as_ref(),
            MessageKind::Response | MessageKind::Unspecified => None,
        };
        let Some(key) = key else {
            return Vec::new();
        };

        let mut matched = self
            .topics
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default();

        let filters = self.filters.read();
        for (filter, entry) in filters.iter() {
            if filter.accepts(attributes.source.as_ref(), attributes.sink.as_ref()) {
                matched.push(entry.clone());
            }
        }

        matched
    }

    /// Returns the number of exact topics with at least one listener.
    #[inline]
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Returns the number of registered filter entries.
    #[inline]
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    struct Recorder {
        received: Mutex<Vec<Envelope>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.received.lock().len()
        }
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn on_receive(&self, envelope: Envelope) {
            self.received.lock().push(envelope);
        }
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).expect("valid uri")
    }

    fn listener(recorder: &Arc<Recorder>) -> Arc<dyn Listener> {
        Arc::clone(recorder) as Arc<dyn Listener>
    }

    #[tokio::test]
    async fn test_register_and_lookup_exact() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let topic = uri("vehicle/door/status");

        registry.register(&topic, listener(&recorder)).expect("register");

        let attrs = Attributes::publish(topic);
        let matched = registry.lookup(&attrs);
        assert_eq!(matched.len(), 1);

        let envelope = Envelope::new(attrs, b"open".to_vec());
        for entry in matched {
            entry.on_receive(envelope.clone()).await;
        }
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_register_rejects_wildcard_topic() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();

        let err = registry
            .register(&uri("vehicle/*/status"), listener(&recorder))
            .expect_err("must fail");
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_duplicate_registration_appends() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let topic = uri("vehicle/door/status");

        registry.register(&topic, listener(&recorder)).expect("first");
        registry.register(&topic, listener(&recorder)).expect("second");

        let matched = registry.lookup(&Attributes::publish(topic));
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_unregister_removes_one_entry() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let topic = uri("vehicle/door/status");
        let l = listener(&recorder);

        registry.register(&topic, Arc::clone(&l)).expect("first");
        registry.register(&topic, Arc::clone(&l)).expect("second");

        registry.unregister(&topic, &l).expect("unregister");
        assert_eq!(registry.lookup(&Attributes::publish(topic)).len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_not_found() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let topic = uri("vehicle/door/status");
        let l = listener(&recorder);

        let err = registry.unregister(&topic, &l).expect_err("must fail");
        assert!(err.is_not_found());

        registry.register(&topic, Arc::clone(&l)).expect("register");
        registry.unregister(&topic, &l).expect("unregister");

        // Second unregister of the same pair.
        let err = registry.unregister(&topic, &l).expect_err("must fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_topic_is_pruned() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let topic = uri("vehicle/door/status");
        let l = listener(&recorder);

        registry.register(&topic, Arc::clone(&l)).expect("register");
        assert_eq!(registry.topic_count(), 1);

        registry.unregister(&topic, &l).expect("unregister");
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = ListenerRegistry::new();
        let first = Recorder::new();
        let second = Recorder::new();
        let topic = uri("vehicle/door/status");

        registry.register(&topic, listener(&first)).expect("first");
        registry.register(&topic, listener(&second)).expect("second");

        let matched = registry.lookup(&Attributes::publish(topic));
        assert_eq!(matched.len(), 2);
        assert!(matched[0].is(&(listener(&first))));
        assert!(matched[1].is(&(listener(&second))));
    }

    #[test]
    fn test_request_routes_by_sink() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let method = uri("service/echo/invoke");

        registry.register(&method, listener(&recorder)).expect("register");

        let attrs = Attributes::request(method, Some(uri("client/reply")), None);
        assert_eq!(registry.lookup(&attrs).len(), 1);

        // The request's source must not match.
        let attrs = Attributes::request(uri("other/method"), Some(uri("service/echo/invoke")), None);
        assert!(registry.lookup(&attrs).is_empty());
    }

    #[test]
    fn test_response_never_matches() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let method = uri("service/echo/invoke");

        registry.register(&method, listener(&recorder)).expect("register");

        let request = Attributes::request(method, None, None);
        let response = Attributes::response_to(&request).expect("response");
        assert!(registry.lookup(&response).is_empty());
    }

    #[test]
    fn test_filter_lookup() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();

        registry
            .register_filter(
                UriFilter::from_source(uri("vehicle/*/status")),
                listener(&recorder),
            )
            .expect("register");

        assert_eq!(
            registry.lookup(&Attributes::publish(uri("vehicle/door/status"))).len(),
            1
        );
        assert_eq!(
            registry.lookup(&Attributes::publish(uri("vehicle/window/status"))).len(),
            1
        );
        assert!(
            registry
                .lookup(&Attributes::publish(uri("vehicle/door/position")))
                .is_empty()
        );
    }

    #[test]
    fn test_exact_and_filter_combine() {
        let registry = ListenerRegistry::new();
        let exact = Recorder::new();
        let filtered = Recorder::new();
        let topic = uri("vehicle/door/status");

        registry.register(&topic, listener(&exact)).expect("exact");
        registry
            .register_filter(UriFilter::from_source(Uri::any()), listener(&filtered))
            .expect("filter");

        let matched = registry.lookup(&Attributes::publish(topic));
        assert_eq!(matched.len(), 2);
        // Exact matches come first.
        assert!(matched[0].is(&(listener(&exact))));
        assert!(matched[1].is(&(listener(&filtered))));
    }

    #[test]
    fn test_unregister_filter() {
        let registry = ListenerRegistry::new();
        let recorder = Recorder::new();
        let filter = UriFilter::new(Uri::any(), uri("service/echo/invoke"));
        let l = listener(&recorder);

        registry
            .register_filter(filter.clone(), Arc::clone(&l))
            .expect("register");
        assert_eq!(registry.filter_count(), 1);

        registry.unregister_filter(&filter, &l).expect("unregister");
        assert_eq!(registry.filter_count(), 0);

        let err = registry.unregister_filter(&filter, &l).expect_err("must fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(ListenerRegistry::new());
        let first = Recorder::new();
        let second = Recorder::new();
        let topic = uri("vehicle/door/status");

        let a = {
            let registry = Arc::clone(&registry);
            let topic = topic.clone();
            let l = listener(&first);
            tokio::spawn(async move { registry.register(&topic, l) })
        };
        let b = {
            let registry = Arc::clone(&registry);
            let topic = topic.clone();
            let l = listener(&second);
            tokio::spawn(async move { registry.register(&topic, l) })
        };

        a.await.expect("join").expect("register");
        b.await.expect("join").expect("register");

        let matched = registry.lookup(&Attributes::publish(topic));
        assert_eq!(matched.len(), 2);

        // Both registered exactly once, order unspecified but each present.
        let l1 = listener(&first);
        let l2 = listener(&second);
        assert_eq!(matched.iter().filter(|e| e.is(&l1)).count(), 1);
        assert_eq!(matched.iter().filter(|e| e.is(&l2)).count(), 1);
    }
}
