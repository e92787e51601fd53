//! # scriptsync-core
//!
//! Tracks a live, growing transcript against a known reference script and
//! emits forward-progress events for a synchronized presentation.
//!
//! - **[`segment`]** -- [`Segmenter`]: script text to ordered match units
//! - **[`tracker`]** -- [`AlignmentTracker`]: lookahead matching, pause on
//!   low similarity or silence, single completion
//! - **[`pacing`]** -- [`FeedPacingController`] and [`FeedLoop`]: gates a
//!   paced sequential feed on alignment events
//! - **[`similarity`]** -- pluggable [`SimilarityScorer`] backends
//! - **[`events`]** -- [`EventSink`] and the published event shapes
//! - **[`source`]** -- transcript sources and script providers, including
//!   `.docx` and `.pdf` scripts
//! - **[`session`]** -- [`SyncSession`], the per-session poll loop
//! - **[`config`]** / **[`error`]** -- settings and the [`SyncError`] type

pub mod config;
mod document;
pub mod error;
pub mod events;
pub mod pacing;
pub mod segment;
pub mod session;
pub mod similarity;
pub mod source;
pub mod tracker;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use events::{AlignmentEvent, EventSink, SessionEvent};
pub use pacing::{FeedLoop, FeedPacingController};
pub use segment::{ExpectedScript, Segment, Segmenter};
pub use session::{SessionOutcome, SyncSession};
pub use similarity::SimilarityScorer;
pub use tracker::{AlignmentTracker, TrackerStatus};
