//! Online/offline state tracking driven by environment reachability events.
//!
//! The observer never polls. Whatever owns the environment (the binary, a
//! platform shim, a test) feeds it "became reachable" / "became unreachable"
//! transitions and the observer fans them out to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}

type Callback = Arc<dyn Fn(ConnectivityState) + Send + Sync>;

/// Holds the current connectivity state and notifies subscribers on change.
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct ConnectivityObserver {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    state: watch::Sender<ConnectivityState>,
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_id: AtomicU64,
}

impl ObserverInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, Callback>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectivityObserver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ConnectivityObserver {
    /// Build an observer from the environment's reachability indicator.
    ///
    /// `None` means the environment cannot tell; the observer then starts
    /// optimistic (`Online`).
    pub fn new(reachable: Option<bool>) -> Self {
        let initial = reachable
            .map(ConnectivityState::from_reachable)
            .unwrap_or(ConnectivityState::Online);
        debug!(state = %initial, known = reachable.is_some(), "connectivity observer initialized");
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(ObserverInner {
                state,
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn current(&self) -> ConnectivityState {
        *self.inner.state.borrow()
    }

    pub fn became_reachable(&self) {
        self.transition(ConnectivityState::Online);
    }

    pub fn became_unreachable(&self) {
        self.transition(ConnectivityState::Offline);
    }

    /// Apply a raw reachability signal.
    pub fn set_reachable(&self, reachable: bool) {
        self.transition(ConnectivityState::from_reachable(reachable));
    }

    fn transition(&self, next: ConnectivityState) {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if !changed {
            return;
        }
        info!(state = %next, "connectivity changed");

        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback> = self.inner.subscribers().values().cloned().collect();
        for callback in callbacks {
            callback(next);
        }
    }

    /// Register a callback invoked synchronously on every state transition.
    ///
    /// The callback stays registered for as long as the returned
    /// [`Subscription`] lives.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers().insert(id, Arc::new(callback));
        Subscription {
            id,
            observer: Arc::downgrade(&self.inner),
        }
    }

    /// Async view of the state for consumers that prefer awaiting changes.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.inner.state.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Handle for a registered connectivity callback. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    observer: Weak<ObserverInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.observer.upgrade() {
            inner.subscribers().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_unknown_environment_defaults_online() {
        assert_eq!(ConnectivityObserver::new(None).current(), ConnectivityState::Online);
        assert_eq!(ConnectivityObserver::default().current(), ConnectivityState::Online);
        assert_eq!(
            ConnectivityObserver::new(Some(false)).current(),
            ConnectivityState::Offline
        );
    }

    #[test]
    fn test_transitions_update_state() {
        let observer = ConnectivityObserver::new(Some(true));
        observer.became_unreachable();
        assert_eq!(observer.current(), ConnectivityState::Offline);
        observer.became_reachable();
        assert_eq!(observer.current(), ConnectivityState::Online);
        observer.set_reachable(false);
        assert_eq!(observer.current(), ConnectivityState::Offline);
    }

    #[test]
    fn test_callbacks_fire_once_per_change() {
        let observer = ConnectivityObserver::new(Some(true));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = observer.subscribe(move |state| sink.lock().unwrap().push(state));

        observer.became_reachable(); // no change
        observer.became_unreachable();
        observer.became_unreachable(); // no change
        observer.became_reachable();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectivityState::Offline, ConnectivityState::Online]
        );
    }

    #[test]
    fn test_dropped_subscription_stops_callbacks() {
        let observer = ConnectivityObserver::new(Some(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = observer.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(observer.subscriber_count(), 1);

        observer.became_unreachable();
        sub.unsubscribe();
        assert_eq!(observer.subscriber_count(), 0);
        observer.became_reachable();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_observer_is_harmless() {
        let observer = ConnectivityObserver::new(None);
        let sub = observer.subscribe(|_| {});
        drop(observer);
        drop(sub);
    }

    #[tokio::test]
    async fn test_watch_receiver_sees_transition() {
        let observer = ConnectivityObserver::new(Some(true));
        let mut rx = observer.watch();
        observer.became_unreachable();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectivityState::Offline);
    }
}
