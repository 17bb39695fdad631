use std::sync::Arc;
use tokio::sync::watch;

/// A one-way `NotReady -> Ready` latch.
///
/// Once marked ready it stays ready for the lifetime of the value, regardless of what happens to
/// the component that owns it afterwards.
#[derive(Debug, Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<bool>>,
}

impl Readiness {
    /// Creates a new latch in the not-ready state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true once [`Readiness::mark_ready`] has been called.
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Flips the latch. Returns true only for the call that performed the transition.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                return false
            }
            *ready = true;
            true
        })
    }

    /// Returns a listener that can await the transition.
    pub fn listener(&self) -> ReadyListener {
        ReadyListener { rx: self.tx.subscribe() }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

/// Observes a [`Readiness`] latch.
#[derive(Debug, Clone)]
pub struct ReadyListener {
    rx: watch::Receiver<bool>,
}

impl ReadyListener {
    /// Returns the current state without waiting.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the latch is ready.
    ///
    /// Returns false if the latch was dropped before it became ready.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }
}
