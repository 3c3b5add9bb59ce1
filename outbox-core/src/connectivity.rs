//! Connectivity edge detection.
//!
//! Platform signals arrive as plain booleans, often repeated. Only the
//! offline→online edge matters to the sync engine; everything else just
//! updates the stored status.

/// What a connectivity signal changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Was offline, now online. Triggers a drain.
    BecameOnline,
    /// Was online, now offline.
    BecameOffline,
    /// Same status as before.
    Unchanged,
}

/// Current connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    online: bool,
}

impl Connectivity {
    /// Start from the platform's current signal.
    pub fn new(online: bool) -> Self {
        Self { online }
    }

    /// Check if currently online.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Record a platform signal and report the transition it caused.
    pub fn on_signal(&mut self, online: bool) -> Transition {
        let transition = match (self.online, online) {
            (false, true) => Transition::BecameOnline,
            (true, false) => Transition::BecameOffline,
            _ => Transition::Unchanged,
        };
        self.online = online;
        transition
    }
}
