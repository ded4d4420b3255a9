//! Named listener lists.
//!
//! A [`Listeners`] holds the callbacks registered for one event. Listeners
//! run in registration order. Emitting snapshots the list first, so a
//! listener may register further listeners or trigger a close without
//! deadlocking.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

/// Callback type stored in a [`Listeners`] list.
pub type Listener<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Ordered callbacks for a single event.
pub struct Listeners<A> {
    inner: Mutex<Vec<Listener<A>>>,
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl<A> fmt::Debug for Listeners<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

impl<A> Listeners<A> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.inner.lock().push(Arc::new(listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    fn snapshot(&self) -> Vec<Listener<A>> {
        self.inner.lock().clone()
    }
}

impl<A: Clone> Listeners<A> {
    /// Invoke every listener in order on the calling task.
    pub fn emit(&self, arg: A) {
        for listener in self.snapshot() {
            listener(arg.clone());
        }
    }
}

impl<A: Clone + Send + 'static> Listeners<A> {
    /// Invoke every listener on its own spawned task.
    ///
    /// Returns immediately. Must be called from within a Tokio runtime.
    pub fn emit_async(&self, arg: A) {
        for listener in self.snapshot() {
            let arg = arg.clone();
            tokio::spawn(async move { listener(arg) });
        }
    }
}

/// Per-connection listener lists.
#[derive(Debug, Default)]
pub struct ConnectionEvents {
    /// Text messages, already decoded as UTF-8.
    pub message_text: Listeners<String>,
    /// Binary messages.
    pub message_binary: Listeners<Bytes>,
    /// Fired once with the close reason when the connection starts closing.
    pub close: Listeners<String>,
}

impl ConnectionEvents {
    /// Drop every registered listener.
    pub fn clear(&self) {
        self.message_text.clear();
        self.message_binary.clear();
        self.close.clear();
    }
}
