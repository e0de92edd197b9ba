//! Command execution: the shell runner, output transforms and the
//! leader/follower protocol that keeps concurrent instances from running
//! the same command twice.

pub mod executor;
pub mod runner;
pub mod transform;

pub use executor::{read_cache, Executor, Outcome, Role, Snapshot};
pub use runner::{OutputStream, Shell, SENTINEL_EXIT_CODE};
pub use transform::{AggregateTransform, LineAction, LineTransform, Pipeline};
