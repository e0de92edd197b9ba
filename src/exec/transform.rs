//! Output transforms applied by the leader
//!
//! A line transform sees every stdout line as it streams and decides whether
//! to keep (possibly rewritten) or drop it. An aggregate transform runs once
//! after the command exits, receives the kept output and the exit code, and
//! its result replaces the cached content wholesale.

use std::fmt;
use std::sync::Arc;

/// Decision of a line transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// Keep this text in place of the original line
    Keep(String),
    /// Leave the line out of the cached output
    Drop,
}

/// Per-line transform
pub type LineTransform = Arc<dyn Fn(&str) -> LineAction + Send + Sync>;

/// Whole-output transform, called with the kept output and the exit code
pub type AggregateTransform = Arc<dyn Fn(&str, i32) -> String + Send + Sync>;

/// Optional line and aggregate transforms
#[derive(Clone, Default)]
pub struct Pipeline {
    line: Option<LineTransform>,
    aggregate: Option<AggregateTransform>,
}

impl Pipeline {
    /// Pipeline with no transforms
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_line_transform<F>(&mut self, transform: F)
    where
        F: Fn(&str) -> LineAction + Send + Sync + 'static,
    {
        self.line = Some(Arc::new(transform));
    }

    pub fn clear_line_transform(&mut self) {
        self.line = None;
    }

    pub fn set_aggregate_transform<F>(&mut self, transform: F)
    where
        F: Fn(&str, i32) -> String + Send + Sync + 'static,
    {
        self.aggregate = Some(Arc::new(transform));
    }

    pub fn clear_aggregate_transform(&mut self) {
        self.aggregate = None;
    }

    /// Run the line transform; without one every line is kept unchanged
    pub fn apply_line(&self, line: String) -> LineAction {
        match &self.line {
            Some(transform) => transform(&line),
            None => LineAction::Keep(line),
        }
    }

    /// Run the aggregate transform, if any, over the finished output
    pub fn finalize(&self, content: &str, code: i32) -> Option<String> {
        self.aggregate
            .as_ref()
            .map(|transform| transform(content, code))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("line", &self.line.is_some())
            .field("aggregate", &self.aggregate.is_some())
            .finish()
    }
}
