//! # Subscription Registry
//!
//! Per-store fan-out of state changes. The registry owns the current state; publishing
//! replaces it and notifies every live listener in registration order.
//!
//! Three rules shape the implementation:
//!
//! - **Late joiners** are replayed the current state synchronously inside
//!   [`SubscriptionRegistry::subscribe`], so nobody has to read the state separately before
//!   relying on notifications.
//! - **Unsubscribing mid-publish** is safe. Listeners are called outside the registry lock, and
//!   each one is re-checked right before it is called, so a listener removed by an earlier
//!   listener in the same pass is skipped while the ones already notified are unaffected.
//! - **Delivery never goes backwards.** Every published state carries a sequence number, and
//!   each listener remembers the last one it was handed. A replay that loses a race against a
//!   newer publish is dropped instead of overwriting it. A listener must not publish to the
//!   registry it is listening to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A state-change callback.
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct Entry<S> {
    active: Arc<AtomicBool>,
    /// Sequence number of the last state handed to `listener`. Held while it runs.
    delivered: Arc<Mutex<Option<u64>>>,
    listener: Listener<S>,
}

impl<S> Clone for Entry<S> {
    fn clone(&self) -> Self {
        Self {
            active: self.active.clone(),
            delivered: self.delivered.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<S> Entry<S> {
    fn deliver(&self, seq: u64, state: &S) {
        let mut delivered = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if delivered.is_some_and(|last| last >= seq) {
            return;
        }
        if self.active.load(Ordering::Acquire) {
            (self.listener)(state);
        }
        *delivered = Some(seq);
    }
}

struct Registry<S> {
    state: S,
    seq: u64,
    entries: Vec<Entry<S>>,
}

/// Holds a state value and the listeners interested in it.
pub struct SubscriptionRegistry<S> {
    inner: Mutex<Registry<S>>,
}

impl<S: Clone> SubscriptionRegistry<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Mutex::new(Registry {
                state: initial,
                seq: 0,
                entries: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A clone of the current state.
    pub fn current(&self) -> S {
        self.lock().state.clone()
    }

    fn register(&self, listener: Listener<S>, replay: bool) -> (Entry<S>, u64, S, Subscription) {
        let active = Arc::new(AtomicBool::new(true));
        let mut registry = self.lock();
        let seq = registry.seq;
        let entry = Entry {
            active: active.clone(),
            delivered: Arc::new(Mutex::new((!replay).then_some(seq))),
            listener,
        };
        registry.entries.retain(|entry| entry.active.load(Ordering::Acquire));
        registry.entries.push(entry.clone());
        (entry, seq, registry.state.clone(), Subscription { active })
    }

    /// Registers `listener` and immediately calls it with the current state.
    ///
    /// Dropping the returned handle leaves the listener registered; call
    /// [`Subscription::unsubscribe`] to remove it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let (entry, seq, state, subscription) = self.register(Arc::new(listener), true);
        entry.deliver(seq, &state);
        subscription
    }

    /// Registers `listener` for states published from now on, without a replay.
    pub fn subscribe_changes<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let (_, _, _, subscription) = self.register(Arc::new(listener), false);
        subscription
    }

    /// Replaces the current state and notifies every live listener, in registration order.
    pub fn publish(&self, state: S) {
        let (seq, entries) = {
            let mut registry = self.lock();
            registry.seq += 1;
            registry.state = state.clone();
            registry.entries.retain(|entry| entry.active.load(Ordering::Acquire));
            (registry.seq, registry.entries.clone())
        };
        for entry in entries {
            entry.deliver(seq, &state);
        }
    }

    /// Number of listeners that have not unsubscribed.
    pub fn listener_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.active.load(Ordering::Acquire))
            .count()
    }
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stops further notifications. Safe to call from inside a listener, and more than once.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&str, u32) + Clone) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = log.clone();
        let record = move |name: &str, value: u32| {
            sink.lock().unwrap().push(format!("{name}:{value}"));
        };
        (log, record)
    }

    #[test]
    fn test_subscribe_replays_current_state() {
        let registry = SubscriptionRegistry::new(7u32);
        let (log, record) = recorder();

        let _sub = registry.subscribe(move |v| record("a", *v));

        assert_eq!(*log.lock().unwrap(), vec!["a:7"]);
    }

    #[test]
    fn test_publish_in_registration_order() {
        let registry = SubscriptionRegistry::new(0u32);
        let (log, record) = recorder();

        let r = record.clone();
        let _a = registry.subscribe(move |v| r("a", *v));
        let _b = registry.subscribe(move |v| record("b", *v));
        registry.publish(1);

        assert_eq!(*log.lock().unwrap(), vec!["a:0", "b:0", "a:1", "b:1"]);
        assert_eq!(registry.current(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let registry = SubscriptionRegistry::new(0u32);
        let (log, record) = recorder();

        let sub = registry.subscribe(move |v| record("a", *v));
        sub.unsubscribe();
        sub.unsubscribe();
        registry.publish(1);

        assert_eq!(*log.lock().unwrap(), vec!["a:0"]);
        assert_eq!(registry.listener_count(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_unsubscribe_during_publish() {
        let registry = SubscriptionRegistry::new(0u32);
        let (log, record) = recorder();

        // `b` is removed by `a` in the middle of a publish pass.
        let victim: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));

        let r = record.clone();
        let v = victim.clone();
        let _a = registry.subscribe(move |value| {
            r("a", *value);
            if *value == 1 {
                if let Some(sub) = v.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            }
        });
        let r = record.clone();
        let b = registry.subscribe(move |value| r("b", *value));
        *victim.lock().unwrap() = Some(b);
        let _c = registry.subscribe(move |value| record("c", *value));

        log.lock().unwrap().clear();
        registry.publish(1);
        registry.publish(2);

        assert_eq!(*log.lock().unwrap(), vec!["a:1", "c:1", "a:2", "c:2"]);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let registry = SubscriptionRegistry::new(0u32);
        let (log, record) = recorder();

        let own: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let handle = own.clone();
        let sub = registry.subscribe(move |value| {
            record("a", *value);
            if let Some(sub) = handle.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *own.lock().unwrap() = Some(sub);

        registry.publish(1);
        registry.publish(2);

        assert_eq!(*log.lock().unwrap(), vec!["a:0", "a:1"]);
    }

    #[test]
    fn test_subscribe_changes_skips_replay() {
        let registry = SubscriptionRegistry::new(0u32);
        let (log, record) = recorder();

        let _sub = registry.subscribe_changes(move |v| record("a", *v));
        registry.publish(1);

        assert_eq!(*log.lock().unwrap(), vec!["a:1"]);
    }

    #[test]
    fn test_replay_racing_publish_never_ends_stale() {
        for _ in 0..2_000 {
            let registry = SubscriptionRegistry::new(0u32);
            let registry = &registry;
            let last: Arc<StdMutex<Vec<u32>>> = Arc::default();

            std::thread::scope(|scope| {
                scope.spawn(move || registry.publish(1));
                let sink = last.clone();
                scope.spawn(move || {
                    registry.subscribe(move |v| sink.lock().unwrap().push(*v));
                });
            });

            let seen = last.lock().unwrap();
            assert_eq!(seen.last(), Some(&1), "listener saw {seen:?}");
            assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}
