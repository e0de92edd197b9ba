//! Cached command handle
//!
//! `CachedCommand` binds one command string to its cache entry and keeps an
//! in-memory copy of the last result it synced. Any number of handles, in
//! any number of processes, may share an entry; the executor guarantees that
//! only one of them runs the command at a time while the rest reuse the
//! output.
//!
//! A handle is not meant to be shared between tasks: every operation takes
//! `&mut self` or reads state that such an operation may change.

use crate::cache::{CacheEntry, CacheKey, CacheState};
use crate::config::{Config, ShellConfig};
use crate::error::ShcacheResult;
use crate::exec::{read_cache, Executor, LineAction, Pipeline, Shell, Snapshot, SENTINEL_EXIT_CODE};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Per-handle settings
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Base directory for entries; created on first update
    pub cache_dir: PathBuf,

    /// Age after which an entry is re-executed
    pub timeout: Duration,

    /// Shell that runs the command
    pub shell: ShellConfig,
}

impl CacheOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            timeout: Duration::from_secs(crate::config::schema::DEFAULT_TIMEOUT_SECS),
            shell: ShellConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }
}

impl From<&Config> for CacheOptions {
    fn from(config: &Config) -> Self {
        Self {
            cache_dir: config.cache.resolved_dir(),
            timeout: Duration::from_secs(config.cache.timeout_secs),
            shell: config.shell.clone(),
        }
    }
}

/// A command whose output is cached on disk
#[derive(Debug)]
pub struct CachedCommand {
    command: String,
    key: CacheKey,
    entry: CacheEntry,
    cache_dir: PathBuf,
    timeout: Duration,
    executor: Executor,
    pipeline: Pipeline,
    content: String,
    code: i32,
    last_sync: DateTime<Utc>,
}

impl CachedCommand {
    /// Bind a handle to `command`. Nothing touches the disk until the first
    /// read or update.
    pub fn new(command: impl Into<String>, options: CacheOptions) -> Self {
        let command = command.into();
        let key = CacheKey::derive(&command);
        let entry = CacheEntry::new(&options.cache_dir, &key);

        Self {
            command,
            key,
            entry,
            cache_dir: options.cache_dir,
            timeout: options.timeout,
            executor: Executor::new(Shell::from(&options.shell)),
            pipeline: Pipeline::new(),
            content: String::new(),
            code: SENTINEL_EXIT_CODE,
            last_sync: DateTime::UNIX_EPOCH,
        }
    }

    /// Cached output, running or rereading the command first if the
    /// in-memory copy is stale
    pub async fn get(&mut self) -> ShcacheResult<&str> {
        self.actualize().await?;
        Ok(&self.content)
    }

    /// Cached exit code, refreshed the same way as `get`.
    ///
    /// Failed launches are cached too and report `SENTINEL_EXIT_CODE`.
    pub async fn code(&mut self) -> ShcacheResult<i32> {
        self.actualize().await?;
        Ok(self.code)
    }

    /// Run the command now, or wait for the instance already running it
    pub async fn update(&mut self) -> ShcacheResult<&str> {
        let outcome = self
            .executor
            .update(&self.entry, &self.command, &self.pipeline)
            .await?;
        debug!("Update of {} finished as {:?}", self.key, outcome.role);

        self.sync(outcome.snapshot);
        Ok(&self.content)
    }

    /// Reread the entry from disk, waiting for an in-flight leader
    pub async fn read_cache(&mut self) -> ShcacheResult<&str> {
        let snapshot = read_cache(&self.entry).await?;
        self.sync(snapshot);
        Ok(&self.content)
    }

    /// Whatever the content file holds right now, without locking.
    ///
    /// May be a partial result of a running leader; empty on any error.
    pub async fn peek(&self) -> String {
        String::from_utf8_lossy(&self.peek_bytes().await).into_owned()
    }

    /// Raw bytes behind `peek`
    pub async fn peek_bytes(&self) -> Vec<u8> {
        self.entry.peek().await
    }

    /// What `get` would have to do right now
    pub fn cache_state(&self) -> ShcacheResult<CacheState> {
        Ok(CacheState::evaluate(
            self.entry.modified()?,
            Utc::now(),
            self.timeout,
            self.last_sync,
        ))
    }

    /// Whether some instance currently holds the entry lock
    pub fn update_in_progress(&self) -> ShcacheResult<bool> {
        self.entry.is_locked()
    }

    /// Rebind the handle to another command.
    ///
    /// The previous entry is left on disk untouched; the in-memory result is
    /// discarded so it cannot be served for the new command.
    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
        self.key = CacheKey::derive(&self.command);
        self.rebind();
    }

    /// Alias of `set_command`
    pub fn put(&mut self, command: impl Into<String>) {
        self.set_command(command);
    }

    /// Move the handle to another cache directory
    pub fn set_cache_dir(&mut self, cache_dir: impl Into<PathBuf>) {
        self.cache_dir = cache_dir.into();
        self.rebind();
    }

    pub fn set_cache_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Transform each output line of future runs; `Drop` leaves it out
    pub fn set_line_transform<F>(&mut self, transform: F)
    where
        F: Fn(&str) -> LineAction + Send + Sync + 'static,
    {
        self.pipeline.set_line_transform(transform);
    }

    pub fn clear_line_transform(&mut self) {
        self.pipeline.clear_line_transform();
    }

    /// Replace the whole output of future runs with `transform(output, code)`
    pub fn set_aggregate_transform<F>(&mut self, transform: F)
    where
        F: Fn(&str, i32) -> String + Send + Sync + 'static,
    {
        self.pipeline.set_aggregate_transform(transform);
    }

    pub fn clear_aggregate_transform(&mut self) {
        self.pipeline.clear_aggregate_transform();
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Path of the content file
    pub fn path(&self) -> &Path {
        self.entry.content_path()
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_timeout(&self) -> Duration {
        self.timeout
    }

    /// Last moment the in-memory result was known to match the entry
    pub fn update_time(&self) -> DateTime<Utc> {
        self.last_sync
    }

    async fn actualize(&mut self) -> ShcacheResult<()> {
        match self.cache_state()? {
            CacheState::NeedsUpdate => {
                self.update().await?;
            }
            CacheState::NeedsReread => {
                self.read_cache().await?;
            }
            CacheState::Fresh => {}
        }
        Ok(())
    }

    fn sync(&mut self, snapshot: Snapshot) {
        self.content = snapshot.content;
        self.code = snapshot.code;
        self.last_sync = Utc::now();
    }

    fn rebind(&mut self) {
        self.entry = CacheEntry::new(&self.cache_dir, &self.key);
        self.content.clear();
        self.code = SENTINEL_EXIT_CODE;
        self.last_sync = DateTime::UNIX_EPOCH;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn options(temp: &TempDir) -> CacheOptions {
        CacheOptions::new(temp.path().join("cache"))
    }

    fn listing_command(temp: &TempDir) -> String {
        let dir = temp.path().join("listing");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("abc_file"), "ok\n").unwrap();
        format!("sleep 1; ls {}", dir.display())
    }

    fn counted_command(temp: &TempDir) -> (String, PathBuf) {
        let counter = temp.path().join("runs");
        let command = format!("echo run >> {}; sleep 1; echo done", counter.display());
        (command, counter)
    }

    fn run_count(counter: &Path) -> usize {
        fs::read_to_string(counter)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn get_runs_on_first_access() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new(listing_command(&temp), options(&temp));

        assert_eq!(db.cache_state().unwrap(), CacheState::NeedsUpdate);
        assert!(db.get().await.unwrap().contains("abc_file"));
        assert_eq!(db.code().await.unwrap(), 0);
        assert_eq!(db.cache_state().unwrap(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn get_serves_cached_result_until_update() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new(listing_command(&temp), options(&temp));
        db.update().await.unwrap();

        fs::write(temp.path().join("listing").join("efg_file"), "ok\n").unwrap();
        assert!(!db.get().await.unwrap().contains("efg_file"));

        db.update().await.unwrap();
        assert!(db.get().await.unwrap().contains("efg_file"));
    }

    #[tokio::test]
    async fn second_instance_rereads_without_running() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);
        let mut first = CachedCommand::new(command.clone(), options(&temp));
        let mut second = CachedCommand::new(command, options(&temp));

        first.update().await.unwrap();
        assert_eq!(second.cache_state().unwrap(), CacheState::NeedsReread);

        let started = Instant::now();
        assert_eq!(second.get().await.unwrap(), "done\n");
        assert!(started.elapsed() < Duration::from_millis(500));

        let started = Instant::now();
        second.get().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(run_count(&counter), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_instances_run_command_once() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);
        let mut first = CachedCommand::new(command.clone(), options(&temp));
        let mut second = CachedCommand::new(command, options(&temp));

        let (a, b) = tokio::join!(first.get(), second.get());
        assert_eq!(a.unwrap(), "done\n");
        assert_eq!(b.unwrap(), "done\n");
        assert_eq!(run_count(&counter), 1);

        assert_eq!(first.code().await.unwrap(), second.code().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tasks_run_command_once() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut db = CachedCommand::new(command.clone(), options(&temp));
                tokio::spawn(async move {
                    let content = db.get().await.map(str::to_owned);
                    (content, db.code().await)
                })
            })
            .collect();

        for handle in handles {
            let (content, code) = handle.await.unwrap();
            assert_eq!(content.unwrap(), "done\n");
            assert_eq!(code.unwrap(), 0);
        }
        assert_eq!(run_count(&counter), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_rerun() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("marker");
        fs::write(&marker, "before\n").unwrap();
        let command = format!("cat {}", marker.display());

        let mut first = CachedCommand::new(command.clone(), options(&temp));
        let mut second = CachedCommand::new(command, options(&temp));
        second.set_cache_timeout(Duration::from_secs(1));

        assert_eq!(first.get().await.unwrap(), "before\n");
        fs::write(&marker, "after\n").unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(second.cache_state().unwrap(), CacheState::NeedsUpdate);
        assert_eq!(second.get().await.unwrap(), "after\n");

        // The default timeout has not passed, but the entry changed on disk
        assert_eq!(first.cache_state().unwrap(), CacheState::NeedsReread);
        assert_eq!(first.get().await.unwrap(), "after\n");
    }

    #[tokio::test]
    async fn exit_code_is_shared_between_instances() {
        let temp = TempDir::new().unwrap();
        let code_file = temp.path().join("code");
        let command = format!(
            "x=$(cat {}); echo \">>$x<<\"; exit $x",
            code_file.display()
        );

        let mut first = CachedCommand::new(command.clone(), options(&temp));
        let mut second = CachedCommand::new(command, options(&temp));

        fs::write(&code_file, "1\n").unwrap();
        assert_eq!(first.code().await.unwrap(), 1);

        fs::write(&code_file, "2\n").unwrap();
        assert_eq!(second.update().await.unwrap(), ">>2<<\n");

        assert_eq!(first.code().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unlaunchable_command_reports_sentinel() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new("", options(&temp));

        assert_eq!(db.code().await.unwrap(), SENTINEL_EXIT_CODE);
        assert_eq!(db.get().await.unwrap(), "");

        // The failure is served to other instances until it expires
        let mut other = CachedCommand::new("", options(&temp));
        assert_eq!(other.code().await.unwrap(), SENTINEL_EXIT_CODE);
    }

    #[tokio::test]
    async fn new_instance_reports_sentinel_before_sync() {
        let temp = TempDir::new().unwrap();
        let db = CachedCommand::new("true", options(&temp));
        assert_eq!(db.update_time(), DateTime::UNIX_EPOCH);
        assert!(!db.update_in_progress().unwrap());
        assert_eq!(db.peek().await, "");
    }

    fn listing_lines(db: &mut CachedCommand) {
        db.set_line_transform(|line| match line.strip_prefix('d') {
            Some(name) => LineAction::Keep(format!("DIR: {}", name.trim())),
            None => LineAction::Drop,
        });
    }

    const LISTING: &str = "printf 'd alpha\\nf beta\\nd gamma\\n'";

    #[tokio::test]
    async fn line_transform_keeps_order() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new(LISTING, options(&temp));
        listing_lines(&mut db);

        assert_eq!(db.get().await.unwrap(), "DIR: alpha\nDIR: gamma\n");
        assert_eq!(fs::read_to_string(db.path()).unwrap(), "DIR: alpha\nDIR: gamma\n");
    }

    #[tokio::test]
    async fn aggregate_runs_after_line_transform() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new(LISTING, options(&temp));
        listing_lines(&mut db);
        db.set_aggregate_transform(|content, code| {
            format!("{} lines ({})", content.lines().count(), code)
        });

        assert_eq!(db.get().await.unwrap(), "2 lines (0)");

        db.clear_line_transform();
        assert_eq!(db.update().await.unwrap(), "3 lines (0)");

        db.clear_aggregate_transform();
        assert_eq!(db.update().await.unwrap(), "d alpha\nf beta\nd gamma\n");
    }

    #[tokio::test]
    async fn transform_change_does_not_touch_cached_content() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new(LISTING, options(&temp));
        db.get().await.unwrap();

        listing_lines(&mut db);
        assert_eq!(db.get().await.unwrap(), "d alpha\nf beta\nd gamma\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn peek_sees_growing_prefix() {
        let temp = TempDir::new().unwrap();
        let command = "for i in 1 2 3 4; do echo x; sleep 1; done";
        let mut leader = CachedCommand::new(command, options(&temp));
        let observer = CachedCommand::new(command, options(&temp));

        let running = tokio::spawn(async move { leader.get().await.map(str::to_owned) });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(observer.update_in_progress().unwrap());
        let early = observer.peek().await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let later = observer.peek().await;

        let done = running.await.unwrap().unwrap();
        assert_eq!(done, "x\nx\nx\nx\n");
        assert!(!early.is_empty());
        assert!(later.starts_with(&early));
        assert!(done.starts_with(&later));
        assert!(later.len() < done.len());
        assert!(!observer.update_in_progress().unwrap());
    }

    #[tokio::test]
    async fn set_command_detaches_previous_result() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new("echo first", options(&temp));
        assert_eq!(db.get().await.unwrap(), "first\n");
        let first_path = db.path().to_path_buf();

        db.set_command("echo second");
        assert_ne!(db.path(), first_path);
        assert_eq!(db.cache_state().unwrap(), CacheState::NeedsUpdate);
        assert_eq!(db.update_time(), DateTime::UNIX_EPOCH);
        assert_eq!(db.get().await.unwrap(), "second\n");

        // The old entry is left as it was
        assert_eq!(fs::read_to_string(first_path).unwrap(), "first\n");

        db.put("echo first");
        assert_eq!(db.cache_state().unwrap(), CacheState::NeedsReread);
        assert_eq!(db.get().await.unwrap(), "first\n");
    }

    #[tokio::test]
    async fn set_cache_dir_moves_entry() {
        let temp = TempDir::new().unwrap();
        let mut db = CachedCommand::new("echo moved", options(&temp));
        db.get().await.unwrap();

        let elsewhere = temp.path().join("elsewhere");
        db.set_cache_dir(&elsewhere);
        assert!(db.path().starts_with(&elsewhere));
        assert_eq!(db.cache_state().unwrap(), CacheState::NeedsUpdate);
        assert_eq!(db.get().await.unwrap(), "moved\n");
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/var/cache/entries"));
        config.cache.timeout_secs = 5;

        let options = CacheOptions::from(&config);
        assert_eq!(options.cache_dir, PathBuf::from("/var/cache/entries"));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.shell, ShellConfig::default());
    }
}
