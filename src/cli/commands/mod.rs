//! CLI command implementations

pub mod code;
pub mod config;
pub mod get;
pub mod key;
pub mod peek;
pub mod status;
pub mod update;

pub use code::execute as code;
pub use config::execute as config;
pub use get::execute as get;
pub use key::execute as key;
pub use peek::execute as peek;
pub use status::execute as status;
pub use update::execute as update;

use crate::cache::CacheState;
use crate::config::Config;
use crate::db::{CacheOptions, CachedCommand};
use crate::error::{ShcacheError, ShcacheResult};
use crate::ui::{TaskSpinner, UiContext};
use std::io::{self, Write};
use std::process::ExitCode;

/// Handle for `command` using the resolved configuration
fn open(command: &str, config: &Config) -> CachedCommand {
    CachedCommand::new(command, CacheOptions::from(config))
}

/// Spinner describing what `get`/`update` is about to wait for
fn progress(db: &CachedCommand, forced: bool) -> ShcacheResult<TaskSpinner> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);

    let needs_work = forced || db.cache_state()? != CacheState::Fresh;
    if needs_work {
        let message = if db.update_in_progress()? {
            format!("Waiting for `{}`", db.command())
        } else {
            format!("Running `{}`", db.command())
        };
        spinner.start(&message);
    }

    Ok(spinner)
}

/// Write cached output to stdout exactly as stored
fn print_content(bytes: &[u8]) -> ShcacheResult<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|e| ShcacheError::io("writing to stdout", e))
}

/// Process exit status for a cached exit code
fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(wrap_exit_code(code))
}

/// Truncate to the low byte like a shell does, so -1 becomes 255
fn wrap_exit_code(code: i32) -> u8 {
    (code & 0xff) as u8
}
