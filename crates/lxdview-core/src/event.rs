//! Listener lists with explicit unsubscribe.
//!
//! An [`EventEmitter`] keeps its listeners in subscription order and calls
//! them in that order on every [`fire`](EventEmitter::fire). Subscribing
//! returns a [`Subscription`]; disposing or dropping it removes the listener.
//! Consumers that should only listen get an [`Event`] handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::dispose::{Dispose, DisposeError};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
    disposed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner side of an event: can fire and subscribe.
pub struct EventEmitter<T> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
                disposed: false,
            })),
        }
    }

    /// Subscribe-only handle to hand out to consumers.
    pub fn event(&self) -> Event<T> {
        Event {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        subscribe(&self.inner, listener)
    }

    /// Call every listener, in subscription order.
    ///
    /// Listeners run outside the internal lock, so they may subscribe or
    /// unsubscribe; such changes apply from the next `fire`.
    pub fn fire(&self, value: &T) {
        let listeners: Vec<Listener<T>> = {
            let guard = lock(&self.inner);
            if guard.disposed {
                return;
            }
            guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.inner).disposed
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Dispose for EventEmitter<T> {
    /// Drop all listeners; later `fire` calls and subscriptions are inert.
    fn dispose(&self) -> Result<(), DisposeError> {
        let mut guard = lock(&self.inner);
        guard.disposed = true;
        guard.entries.clear();
        Ok(())
    }
}

/// Subscribe-only view of an [`EventEmitter`].
pub struct Event<T> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> Event<T> {
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        subscribe(&self.inner, listener)
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn subscribe<T: 'static, F>(inner: &Arc<Mutex<Listeners<T>>>, listener: F) -> Subscription
where
    F: Fn(&T) + Send + Sync + 'static,
{
    let mut guard = lock(inner);
    if guard.disposed {
        return Subscription::inert();
    }
    let id = guard.next_id;
    guard.next_id += 1;
    guard.entries.push((id, Arc::new(listener)));

    let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(inner);
    Subscription {
        release: Mutex::new(Some(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        }))),
    }
}

/// Handle for one listener. Unsubscribes on dispose or drop.
pub struct Subscription {
    release: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            release: Mutex::new(None),
        }
    }

    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(release) = lock(&self.release).take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.release).is_some()
    }
}

impl Dispose for Subscription {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.unsubscribe();
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
