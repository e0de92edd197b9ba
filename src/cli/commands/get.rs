//! Get command - print cached output

use crate::cli::args::GetArgs;
use crate::config::Config;
use crate::error::ShcacheResult;
use std::process::ExitCode;
use tracing::debug;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> ShcacheResult<ExitCode> {
    let mut db = super::open(&args.target.command, config);
    debug!("Entry for `{}`: {}", db.command(), db.path().display());

    let mut spinner = super::progress(&db, false)?;
    let content = db.get().await?.to_owned();
    spinner.clear();

    super::print_content(content.as_bytes())?;

    if args.exit {
        return Ok(super::exit_status(db.code().await?));
    }
    Ok(ExitCode::SUCCESS)
}
