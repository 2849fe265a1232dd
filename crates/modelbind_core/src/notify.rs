//! Property-changed notifications.
//!
//! Accessors raise a raw property-name signal through a [`ChangeSink`].
//! The facade owns an [`ObserverList`] whose first subscriber activates the
//! sink on the current accessor and whose last unsubscribe deactivates it.

use crate::object::ModelObject;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Raw change signal raised by an accessor after a mutation.
pub type ChangeSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked for each property change of a subscribed object.
pub type PropertyChangedCallback = Arc<dyn Fn(&ModelObject, &PropertyChanged) + Send + Sync>;

/// A property-changed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    /// Name of the property that changed.
    pub property: String,
}

impl PropertyChanged {
    /// Creates an event for `property`.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub(crate) u64);

impl SubscriptionToken {
    /// Returns the raw token value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Whether the facade is forwarding accessor signals to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// No observers; the accessor is not forwarding.
    #[default]
    Inactive,
    /// At least one observer; the accessor forwards to the facade.
    Active,
}

/// Bridge transition required after an observer list change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BridgeTransition {
    Activate,
    Deactivate,
    None,
}

/// Observers of one facade.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_token: u64,
    observers: Vec<(SubscriptionToken, PropertyChangedCallback)>,
    state: BridgeState,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .field("state", &self.state)
            .finish()
    }
}

impl ObserverList {
    pub(crate) fn state(&self) -> BridgeState {
        self.state
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn add(
        &mut self,
        callback: PropertyChangedCallback,
    ) -> (SubscriptionToken, BridgeTransition) {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.observers.push((token, callback));
        let transition = match self.state {
            BridgeState::Inactive => {
                self.state = BridgeState::Active;
                BridgeTransition::Activate
            }
            BridgeState::Active => BridgeTransition::None,
        };
        (token, transition)
    }

    /// Removes an observer. Returns `None` if the token is unknown.
    pub(crate) fn remove(&mut self, token: SubscriptionToken) -> Option<BridgeTransition> {
        let position = self.observers.iter().position(|(t, _)| *t == token)?;
        self.observers.remove(position);
        if self.observers.is_empty() && self.state == BridgeState::Active {
            self.state = BridgeState::Inactive;
            Some(BridgeTransition::Deactivate)
        } else {
            Some(BridgeTransition::None)
        }
    }

    /// Undoes an activation whose accessor subscription failed.
    pub(crate) fn rollback(&mut self, token: SubscriptionToken) {
        self.observers.retain(|(t, _)| *t != token);
        if self.observers.is_empty() {
            self.state = BridgeState::Inactive;
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<PropertyChangedCallback> {
        self.observers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }
}

/// Sink slot of an unmanaged accessor, shared with its collections.
#[derive(Default)]
pub(crate) struct Notifier {
    sink: Mutex<Option<ChangeSink>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("active", &self.sink.lock().is_some())
            .finish()
    }
}

impl Notifier {
    pub(crate) fn start(&self, sink: ChangeSink) {
        *self.sink.lock() = Some(sink);
    }

    pub(crate) fn stop(&self) {
        *self.sink.lock() = None;
    }

    /// Raises `property`. The slot lock is released before the sink runs.
    pub(crate) fn raise(&self, property: &str) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            trace!(property, "raising property change");
            sink(property);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_raises_only_while_started() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let notifier = Notifier::default();
        notifier.raise("A");

        let seen = Arc::clone(&count);
        notifier.start(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.raise("A");
        notifier.stop();
        notifier.raise("A");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    fn noop() -> PropertyChangedCallback {
        Arc::new(|_, _| {})
    }

    #[test]
    fn first_add_activates_last_remove_deactivates() {
        let mut list = ObserverList::default();
        assert_eq!(list.state(), BridgeState::Inactive);

        let (a, t) = list.add(noop());
        assert_eq!(t, BridgeTransition::Activate);
        let (b, t) = list.add(noop());
        assert_eq!(t, BridgeTransition::None);
        assert_eq!(list.len(), 2);

        assert_eq!(list.remove(a), Some(BridgeTransition::None));
        assert_eq!(list.remove(a), None);
        assert_eq!(list.remove(b), Some(BridgeTransition::Deactivate));
        assert_eq!(list.state(), BridgeState::Inactive);
    }

    #[test]
    fn tokens_are_unique() {
        let mut list = ObserverList::default();
        let (a, _) = list.add(noop());
        list.remove(a);
        let (b, t) = list.add(noop());
        assert_ne!(a, b);
        assert_eq!(t, BridgeTransition::Activate);
    }

    #[test]
    fn rollback_restores_inactive() {
        let mut list = ObserverList::default();
        let (a, _) = list.add(noop());
        list.rollback(a);
        assert_eq!(list.state(), BridgeState::Inactive);
        assert_eq!(list.len(), 0);
    }
}
