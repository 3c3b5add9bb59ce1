//! Per-action retry state machine.
//!
//! Each queued action moves through a tiny lifecycle while being drained:
//!
//! ```text
//! Pending(k) --Applied--> Applied                      (remove)
//! Pending(k) --Failed---> Pending(k+1)   if k+1 < max  (persist retry count)
//! Pending(k) --Failed---> Dropped(k+1)   if k+1 >= max (remove, report)
//! ```
//!
//! The machine is pure: it returns the next state plus the effects the
//! caller must execute against the live queue and the store.

/// Number of failed attempts after which an action is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry cap applied to every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy with the given cap. A cap of zero is raised to one so
    /// every action gets at least one attempt.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    /// The configured cap.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether an action with this many failures must be dropped.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Lifecycle state of a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    /// Waiting in the queue.
    Pending {
        /// Failed attempts so far.
        retry_count: u32,
    },
    /// Applied remotely and removed. Terminal.
    Applied,
    /// Gave up after exhausting retries. Terminal.
    Dropped {
        /// Failed attempts at the time of the drop.
        retry_count: u32,
    },
}

impl ActionState {
    /// A freshly enqueued action.
    pub fn new() -> Self {
        Self::Pending { retry_count: 0 }
    }

    /// Resume from the retry count stored on a queued action.
    pub fn pending(retry_count: u32) -> Self {
        Self::Pending { retry_count }
    }

    /// Process the outcome of one apply attempt.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned effects.
    pub fn on_event(self, event: ApplyEvent, policy: &RetryPolicy) -> (Self, Vec<Effect>) {
        match (self, event) {
            (Self::Pending { .. }, ApplyEvent::Applied) => (
                Self::Applied,
                vec![Effect::Remove, Effect::Report(Outcome::Applied)],
            ),
            (Self::Pending { retry_count }, ApplyEvent::Failed { error }) => {
                let next = retry_count.saturating_add(1);
                if policy.is_exhausted(next) {
                    (
                        Self::Dropped { retry_count: next },
                        vec![
                            Effect::Remove,
                            Effect::Report(Outcome::Dropped {
                                retry_count: next,
                                reason: format!("gave up after {next} failed attempts: {error}"),
                            }),
                        ],
                    )
                } else {
                    (
                        Self::Pending { retry_count: next },
                        vec![
                            Effect::PersistRetryCount { retry_count: next },
                            Effect::Report(Outcome::RetryScheduled {
                                retry_count: next,
                                error,
                            }),
                        ],
                    )
                }
            }

            // Terminal states ignore further outcomes
            (state, _) => (state, vec![]),
        }
    }
}

impl Default for ActionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyEvent {
    /// The remote executor succeeded.
    Applied,
    /// The remote executor failed, timed out, or was missing.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Effects to be executed by the sync engine.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Remove the action from the live queue and persist.
    Remove,
    /// Store the new retry count on the live action and persist.
    PersistRetryCount {
        /// The count to store.
        retry_count: u32,
    },
    /// Report the outcome to the application.
    Report(Outcome),
}

/// Outcomes reported to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Applied remotely.
    Applied,
    /// Failed, will be retried on the next drain.
    RetryScheduled {
        /// Failed attempts so far.
        retry_count: u32,
        /// Error from the last attempt.
        error: String,
    },
    /// Failed for the last time and abandoned.
    Dropped {
        /// Failed attempts at the time of the drop.
        retry_count: u32,
        /// Human-readable reason, suitable for a notification.
        reason: String,
    },
}
