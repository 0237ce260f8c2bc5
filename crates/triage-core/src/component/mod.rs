//! Component resolution engine: maps free-text component declarations,
//! URLs, tracebacks, and file paths to repository components with
//! resolved ownership metadata.

mod commands;
mod extract;
mod matcher;
mod metadata;

pub use commands::{reconcile_component_commands, COMPONENT_COMMAND};
pub use matcher::{ComponentSummary, MatchConfig, MatchResult, MatchStrategy, Matcher};
pub use metadata::{ComponentRecord, ComponentTable, MetadataEntry, RepoLayout};
