//! Triagekit Core
//!
//! The fact-derivation engines behind an issue-tracker triage bot:
//!
//! - [`history`]: merges raw tracker sources into a single chronological
//!   [`Timeline`](triage_domain::Timeline) and answers temporal queries
//!   over it (labels, commands, notifications, waffling).
//! - [`component`]: maps free-text component declarations, URLs,
//!   tracebacks, and file paths to repository components with resolved
//!   ownership metadata and `!component` override commands.
//! - [`facts`]: derives the per-pass [`FactsRecord`] from the timeline,
//!   the component match, and tracker-supplied PR state.
//!
//! The engines are synchronous pure functions of their inputs. The
//! [`pipeline`] module ties them to the timeline cache in
//! `triage-state`, which is the only async seam.

pub mod component;
pub mod facts;
pub mod history;
pub mod pipeline;
pub mod telemetry;

/// Crate version, for embedders that report it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use component::{
    reconcile_component_commands, ComponentRecord, ComponentSummary, ComponentTable, MatchConfig,
    MatchResult, MatchStrategy, Matcher, MetadataEntry, RepoLayout, COMPONENT_COMMAND,
};
pub use facts::{derive_facts, FactsRecord, StaleReview, REBUILD_MERGE_COMMAND};
pub use history::{build_timeline, BoilerplateComment, History};
pub use pipeline::{load_or_build_timeline, resolve_components, triage_snapshot};
pub use telemetry::init_tracing;
