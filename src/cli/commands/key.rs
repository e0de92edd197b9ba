//! Key command - print the cache key of a command

use crate::cache::CacheKey;
use crate::cli::args::CommandArgs;
use crate::error::ShcacheResult;

/// Execute the key command
pub fn execute(args: CommandArgs) -> ShcacheResult<()> {
    println!("{}", CacheKey::derive(&args.command));
    Ok(())
}
