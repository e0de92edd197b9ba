//! Progress indicators with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner on stderr while a command runs or a leader is awaited.
///
/// Silent in non-interactive mode so stderr stays clean for scripts.
pub struct TaskSpinner {
    bar: Option<ProgressBar>,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar
        });
        Self { bar }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
        }
    }

    /// Remove the spinner from the terminal
    pub fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for TaskSpinner {
    fn drop(&mut self) {
        self.clear();
    }
}
