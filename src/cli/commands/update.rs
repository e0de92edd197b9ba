//! Update command - force a run and print its output

use crate::cli::args::CommandArgs;
use crate::config::Config;
use crate::error::ShcacheResult;

/// Execute the update command
pub async fn execute(args: CommandArgs, config: &Config) -> ShcacheResult<()> {
    let mut db = super::open(&args.command, config);

    let mut spinner = super::progress(&db, true)?;
    let content = db.update().await?.to_owned();
    spinner.clear();

    super::print_content(content.as_bytes())
}
