//! Connectivity monitor.
//!
//! Tracks the platform's online/offline signal and fires a single hook on
//! every offline→online edge. The sync engine registers that hook to start
//! a drain.

use outbox_core::{Connectivity, Transition};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type OnlineHook = Arc<dyn Fn() + Send + Sync>;

/// Online/offline status plus a "became online" hook.
pub struct ConnectivityMonitor {
    state: Mutex<Connectivity>,
    hook: Mutex<Option<OnlineHook>>,
    status: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor from the platform's current signal.
    pub fn new(online: bool) -> Self {
        let (status, _) = watch::channel(online);
        Self {
            state: Mutex::new(Connectivity::new(online)),
            hook: Mutex::new(None),
            status,
        }
    }

    /// Check if currently online.
    pub fn is_online(&self) -> bool {
        lock(&self.state).is_online()
    }

    /// Feed a platform online/offline signal.
    ///
    /// On the offline→online edge the registered hook runs after the new
    /// status is visible, so the hook itself observes `is_online() == true`.
    pub fn set_online(&self, online: bool) -> Transition {
        let transition = lock(&self.state).on_signal(online);
        self.status.send_replace(online);

        match transition {
            Transition::BecameOnline => {
                tracing::info!("connectivity restored");
                let hook = lock(&self.hook).clone();
                if let Some(hook) = hook {
                    hook();
                }
            }
            Transition::BecameOffline => tracing::info!("connectivity lost"),
            Transition::Unchanged => {}
        }

        transition
    }

    /// Register the hook fired on every offline→online edge.
    ///
    /// Only one hook is kept; registering again replaces it.
    pub fn on_online<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.hook) = Some(Arc::new(hook));
    }

    /// Watch the online status.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("hook", &lock(&self.hook).is_some())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
