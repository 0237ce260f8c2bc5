//! Event history engine: timeline construction and temporal queries.

mod builder;
mod queries;

pub use builder::build_timeline;
pub use queries::{BoilerplateComment, History};
