//! # outbox-types
//!
//! Data model for the offline action queue.
//!
//! This crate provides the foundational types used across all outbox crates:
//! - [`ActionId`] - Stable identity of a queued action
//! - [`ActionKind`] - Closed set of remote operations an action can replay
//! - [`QueuedAction`] - One buffered mutation plus its retry metadata
//! - [`encode_queue`] / [`decode_queue`] - The persisted JSON blob format
//! - [`OutboxError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod codec;
mod error;
mod ids;

pub use action::{ActionKind, QueuedAction};
pub use codec::{decode_queue, encode_queue};
pub use error::OutboxError;
pub use ids::ActionId;
