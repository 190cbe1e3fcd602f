//! hourface: scheduled, time-indexed profile-image rotation.
//!
//! Each invocation runs one update cycle against an AT-Protocol account:
//! it resolves which pre-registered blob the profile should show this
//! hour, verifies the service is reachable, authenticates, fetches and
//! classifies the blob, and writes the profile record back using a
//! compare-and-swap on the previously-read record version — so a
//! concurrent edit (or an overlapping manual run) is rejected by the
//! service instead of being clobbered.
//!
//! # Architecture
//!
//! The cycle is a linear pipeline with early exit at every stage:
//! - **Schedule** ([`schedule`]): hour-of-day → content ids
//! - **Probe** ([`probe`]): endpoint normalization + liveness gate
//! - **Session** ([`session`]): login, record read/write with `swapRecord`
//! - **Blobs** ([`blob`]): fetch by `(did, cid)` + magic-byte classification
//! - **Merge** ([`profile`]): selective overlay preserving unrelated fields
//! - **Orchestration** ([`pipeline`]): stage sequencing and outcomes
//!
//! Recurrence belongs to an external scheduler (cron, systemd timer);
//! the process runs once and exits with a per-failure-class status code.

pub mod blob;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod profile;
pub mod schedule;
pub mod session;

pub use config::AppConfig;
pub use error::{Result, RotationError};
pub use pipeline::{CycleOutcome, RotationPipeline};
pub use schedule::{AssetSelection, ContentId, Schedule};
