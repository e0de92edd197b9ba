//! Peek command - read the entry without waiting for a running update

use crate::cli::args::PeekArgs;
use crate::config::Config;
use crate::error::ShcacheResult;
use std::time::Duration;
use tracing::debug;

/// Execute the peek command
pub async fn execute(args: PeekArgs, config: &Config) -> ShcacheResult<()> {
    let db = super::open(&args.target.command, config);

    if !args.follow {
        return super::print_content(&db.peek_bytes().await);
    }

    let interval = Duration::from_millis(args.interval_ms.max(10));
    let mut shown: Vec<u8> = Vec::new();

    loop {
        // Check before reading so the last read covers everything written
        let running = db.update_in_progress()?;
        let current = db.peek_bytes().await;

        let start = unseen_from(&shown, &current);
        if start == 0 && !shown.is_empty() {
            debug!("Entry was rewritten by a new run; starting over");
        }
        super::print_content(&current[start..])?;
        shown = current;

        if !running {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

/// Offset of the first byte of `current` not printed yet.
///
/// Each run truncates the entry before writing, so content that no longer
/// starts with what was shown belongs to a new run and is printed in full.
fn unseen_from(shown: &[u8], current: &[u8]) -> usize {
    if current.starts_with(shown) {
        shown.len()
    } else {
        0
    }
}
