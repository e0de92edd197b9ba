//! Terminal output helpers
//!
//! Styled output and spinners in an interactive terminal, plain text in CI
//! or when piped. Cached command output itself always goes to stdout
//! untouched; everything here is decoration around it.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, key_value_status, section, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
