//! # outbox-core
//!
//! Pure logic for the offline outbox (no I/O, instant tests).
//!
//! This crate implements the queue, the per-action retry state machine and
//! connectivity edge detection without any storage, network or runtime.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Persistence and remote calls are performed by `outbox-client`, which
//! interprets the effects produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod queue;
pub mod retry;

pub use connectivity::{Connectivity, Transition};
pub use queue::ActionQueue;
pub use retry::{ActionState, ApplyEvent, Effect, Outcome, RetryPolicy, DEFAULT_MAX_RETRIES};
