use slab::Slab;
use std::sync::{Arc, Mutex, Weak};

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Set of change listeners shared by a store.
///
/// Stores call [`Listeners::notify`] after every committed mutation.
/// Consumers hold the returned [`Subscription`] for as long as their view
/// lives; dropping it removes the callback.
pub struct Listeners<E> {
    slots: Arc<Mutex<Slab<Callback<E>>>>,
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slab::new())),
        }
    }

    pub fn subscribe(&self, cb: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = match self.slots.lock() {
            Ok(mut slots) => slots.insert(Arc::new(cb)),
            Err(_) => {
                tracing::error!("listener set poisoned; subscription ignored");
                return Subscription::detached();
            }
        };
        let weak: Weak<Mutex<Slab<Callback<E>>>> = Arc::downgrade(&self.slots);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    if let Ok(mut slots) = slots.lock() {
                        if slots.contains(id) {
                            slots.remove(id);
                        }
                    }
                }
            })),
        }
    }

    /// Invoke every registered callback with `event`.
    ///
    /// Callbacks are cloned out before invocation so a listener may subscribe
    /// or drop subscriptions without deadlocking.
    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = match self.slots.lock() {
            Ok(slots) => slots.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => return,
        };
        for cb in callbacks {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped handle returned by [`Listeners::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn detached() -> Self {
        Self { remove: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

/// Last committed snapshot of a derived value.
///
/// `commit` only replaces the snapshot (and reports `true`) when the new
/// value differs from the previous one.
#[derive(Debug, Clone, Default)]
pub struct Tracked<T> {
    committed: Option<T>,
}

impl<T: PartialEq + Clone> Tracked<T> {
    pub fn new() -> Self {
        Self { committed: None }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            committed: Some(value),
        }
    }

    pub fn commit(&mut self, next: &T) -> bool {
        if self.committed.as_ref() == Some(next) {
            return false;
        }
        self.committed = Some(next.clone());
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.committed.as_ref()
    }

    pub fn reset(&mut self) {
        self.committed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dropping_subscription_stops_notifications() {
        let listeners: Listeners<u32> = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = listeners.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        listeners.notify(&1);
        drop(sub);
        listeners.notify(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn tracked_commits_only_on_change() {
        let mut tracked = Tracked::new();
        assert!(tracked.commit(&vec![1, 2]));
        assert!(!tracked.commit(&vec![1, 2]));
        assert!(tracked.commit(&vec![2]));
        assert_eq!(tracked.get(), Some(&vec![2]));
    }
}
