//! Leader/follower execution
//!
//! `update` tries the entry lock without blocking. The winner leads: it runs
//! the command, streams kept lines into the content file one flush at a time,
//! applies the aggregate transform and writes the exit code before letting
//! go of the lock. Everyone else follows: they block on the same lock and
//! read the leader's finished result instead of running the command again.

use crate::cache::{CacheEntry, ContentWriter, EntryLock};
use crate::error::{ShcacheError, ShcacheResult};
use crate::exec::runner::{Shell, SENTINEL_EXIT_CODE};
use crate::exec::transform::{LineAction, Pipeline};
use tracing::{debug, info, warn};

/// Content and exit code of an entry as seen by one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: String,
    pub code: i32,
}

/// How an instance took part in an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Ran the command
    Leader,
    /// Waited for another holder and read its result
    Follower,
}

/// Result of `Executor::update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub snapshot: Snapshot,
    pub role: Role,
}

/// Runs the leader/follower protocol for cache entries
#[derive(Debug, Clone, Default)]
pub struct Executor {
    shell: Shell,
}

impl Executor {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    /// Refresh `entry` by running `command`, unless another holder already is
    pub async fn update(
        &self,
        entry: &CacheEntry,
        command: &str,
        pipeline: &Pipeline,
    ) -> ShcacheResult<Outcome> {
        match try_lock(entry).await? {
            Some(lock) => {
                info!("Running `{}`", command);
                let snapshot = self.lead(entry, lock, command, pipeline).await?;
                Ok(Outcome {
                    snapshot,
                    role: Role::Leader,
                })
            }
            None => {
                info!("`{}` is already running elsewhere, waiting for its result", command);
                let snapshot = read_cache(entry).await?;
                Ok(Outcome {
                    snapshot,
                    role: Role::Follower,
                })
            }
        }
    }

    /// Run `command` while holding the lock. If the run cannot be recorded,
    /// the exit code file is removed before the lock is released.
    async fn lead(
        &self,
        entry: &CacheEntry,
        lock: EntryLock,
        command: &str,
        pipeline: &Pipeline,
    ) -> ShcacheResult<Snapshot> {
        let result = self.record(entry, &lock, command, pipeline).await;

        if let Err(ref e) = result {
            warn!("Discarding entry for `{}`: {}", command, e);
            if let Err(cleanup) = entry.discard_code(&lock).await {
                warn!("{}", cleanup);
            }
        }
        drop(lock);

        let snapshot = result?;
        info!("`{}` finished with exit code {}", command, snapshot.code);
        Ok(snapshot)
    }

    async fn record(
        &self,
        entry: &CacheEntry,
        lock: &EntryLock,
        command: &str,
        pipeline: &Pipeline,
    ) -> ShcacheResult<Snapshot> {
        let mut writer = lock.writer()?;
        writer.truncate().await?;

        let (mut content, code) = match self.stream(&mut writer, command, pipeline).await {
            Ok(result) => result,
            Err(e) if e.is_command_failure() => {
                // The failure itself is cached until the entry expires
                warn!("{}", e);
                writer.truncate().await?;
                (String::new(), SENTINEL_EXIT_CODE)
            }
            Err(e) => return Err(e),
        };

        if let Some(replacement) = pipeline.finalize(&content, code) {
            debug!(
                "Aggregate transform replaced {} bytes with {}",
                content.len(),
                replacement.len()
            );
            writer.replace(&replacement).await?;
            content = replacement;
        }

        entry.write_code(lock, code).await?;
        Ok(Snapshot { content, code })
    }

    async fn stream(
        &self,
        writer: &mut ContentWriter,
        command: &str,
        pipeline: &Pipeline,
    ) -> ShcacheResult<(String, i32)> {
        // Dropping the stream on error kills the command
        let mut output = self.shell.spawn(command)?;
        let mut content = String::new();
        let mut dropped = 0usize;

        while let Some(line) = output.next_line().await? {
            match pipeline.apply_line(line) {
                LineAction::Keep(line) => {
                    writer.append_line(&line).await?;
                    content.push_str(&line);
                    content.push('\n');
                }
                LineAction::Drop => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("Line transform dropped {} line(s)", dropped);
        }

        let code = output.wait().await?;
        Ok((content, code))
    }
}

async fn try_lock(entry: &CacheEntry) -> ShcacheResult<Option<EntryLock>> {
    let entry = entry.clone();

    tokio::task::spawn_blocking(move || entry.try_lock())
        .await
        .map_err(|e| ShcacheError::Internal(format!("cache lock task failed: {}", e)))?
}

/// Read a finished entry, waiting for any in-flight leader first
pub async fn read_cache(entry: &CacheEntry) -> ShcacheResult<Snapshot> {
    let entry = entry.clone();

    tokio::task::spawn_blocking(move || -> ShcacheResult<Snapshot> {
        let mut lock = entry.lock()?;
        let content = lock.read_content()?;
        let code = entry.read_code()?;
        drop(lock);

        debug!(
            "Read {} bytes (exit code {}) from {}",
            content.len(),
            code,
            entry.content_path().display()
        );
        Ok(Snapshot { content, code })
    })
    .await
    .map_err(|e| ShcacheError::Internal(format!("cache read task failed: {}", e)))?
}
