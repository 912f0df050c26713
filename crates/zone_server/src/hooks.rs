//! Ordered lifecycle listener lists.
//!
//! A zone exposes a [`Listeners`] list per lifecycle event (client joined,
//! scheduler started, zone destroyed). Listeners run one after another in
//! subscription order, each one's future awaited before the next starts, and
//! the triggering operation completes only after the last one.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

type Listener<E> = Arc<dyn Fn(E) -> BoxFuture<'static, ()> + Send + Sync>;

/// An ordered list of async listeners for events of type `E`.
pub struct Listeners<E> {
    listeners: Mutex<Vec<Listener<E>>>,
}

impl<E: Clone + Send + 'static> Listeners<E> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Append a listener.
    pub fn subscribe<F, Fut>(&self, listener: F)
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Listener<E> =
            Arc::new(move |event: E| -> BoxFuture<'static, ()> { Box::pin(listener(event)) });
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(boxed);
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every listener in subscription order, awaiting each.
    ///
    /// Listeners subscribed while an emit is in progress first run on the
    /// next emit.
    pub async fn emit(&self, event: E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in snapshot {
            listener(event.clone()).await;
        }
    }
}

impl<E: Clone + Send + 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Listeners").field("count", &count).finish()
    }
}
