//! Code command - print cached exit code

use crate::cli::args::CommandArgs;
use crate::config::Config;
use crate::error::ShcacheResult;

/// Execute the code command
pub async fn execute(args: CommandArgs, config: &Config) -> ShcacheResult<()> {
    let mut db = super::open(&args.command, config);

    let mut spinner = super::progress(&db, false)?;
    let code = db.code().await?;
    spinner.clear();

    println!("{}", code);
    Ok(())
}
