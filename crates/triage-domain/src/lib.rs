//! Triagekit Domain Model
//!
//! Normalized tracker events, the merged timeline, raw snapshot input
//! shapes, and per-pass configuration shared by every engine.

pub mod config;
pub mod error;
pub mod events;
pub mod issue;

pub use config::TriageConfig;
pub use error::{Result, TriageError};
pub use events::{Event, EventKind, ReviewVerdict, Timeline, TIMELINE_SCHEMA_VERSION};
pub use issue::{IssueSnapshot, RawComment, RawCommit, RawLabelEvent, RawReview};
