//! On-disk cache entries
//!
//! An entry is a content file named by the cache key plus a sibling
//! `<key>.code` file holding the exit status as text. The content file doubles
//! as the advisory lock that serializes leaders and followers across
//! processes; the code file is only written while that lock is held.

use crate::cache::key::CacheKey;
use crate::error::{ShcacheError, ShcacheResult};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

/// Suffix of the exit code file
const CODE_SUFFIX: &str = ".code";

/// Location of one cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    content_path: PathBuf,
    code_path: PathBuf,
}

impl CacheEntry {
    /// Entry for `key` under the base cache directory
    pub fn new(cache_dir: &Path, key: &CacheKey) -> Self {
        Self {
            content_path: cache_dir.join(key.as_str()),
            code_path: cache_dir.join(format!("{}{}", key, CODE_SUFFIX)),
        }
    }

    /// Path of the content file
    pub fn content_path(&self) -> &Path {
        &self.content_path
    }

    /// Path of the exit code file
    pub fn code_path(&self) -> &Path {
        &self.code_path
    }

    /// Modification time of a finalized entry.
    ///
    /// Returns `None` until both files exist, so an entry whose first leader
    /// has not finished yet is treated as absent.
    pub fn modified(&self) -> ShcacheResult<Option<DateTime<Utc>>> {
        if !self.code_path.is_file() {
            return Ok(None);
        }

        match fs::metadata(&self.content_path) {
            Ok(meta) => {
                let mtime = meta.modified().map_err(|e| {
                    ShcacheError::io(
                        format!("reading mtime of {}", self.content_path.display()),
                        e,
                    )
                })?;
                Ok(Some(DateTime::<Utc>::from(mtime)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShcacheError::io(
                format!("reading metadata of {}", self.content_path.display()),
                e,
            )),
        }
    }

    /// Try to take the entry lock without blocking, creating the content
    /// file (and cache directory) first if needed.
    ///
    /// Returns `None` when another holder has the lock.
    pub fn try_lock(&self) -> ShcacheResult<Option<EntryLock>> {
        self.ensure_dir()?;

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        let file = options.open(&self.content_path).map_err(|e| {
            ShcacheError::io(format!("opening {}", self.content_path.display()), e)
        })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!("Acquired lock on {}", self.content_path.display());
                Ok(Some(EntryLock::new(file, &self.content_path)))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(ShcacheError::lock(&self.content_path, e)),
        }
    }

    /// Take the entry lock, waiting for any current holder to release it.
    ///
    /// Blocks the calling thread; async callers go through `spawn_blocking`.
    pub fn lock(&self) -> ShcacheResult<EntryLock> {
        let file = File::open(&self.content_path).map_err(|e| {
            ShcacheError::io(format!("opening {}", self.content_path.display()), e)
        })?;

        file.lock_exclusive()
            .map_err(|e| ShcacheError::lock(&self.content_path, e))?;
        trace!("Acquired lock on {} (blocking)", self.content_path.display());

        Ok(EntryLock::new(file, &self.content_path))
    }

    /// Whether some holder currently has the entry lock
    pub fn is_locked(&self) -> ShcacheResult<bool> {
        let file = match File::open(&self.content_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(ShcacheError::io(
                    format!("opening {}", self.content_path.display()),
                    e,
                ))
            }
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if is_contended(&e) => Ok(true),
            Err(e) => Err(ShcacheError::lock(&self.content_path, e)),
        }
    }

    /// Read the exit code file
    pub fn read_code(&self) -> ShcacheResult<i32> {
        let content = fs::read_to_string(&self.code_path).map_err(|e| {
            ShcacheError::io(format!("reading {}", self.code_path.display()), e)
        })?;

        parse_exit_code(&content).ok_or_else(|| ShcacheError::CodeFileInvalid {
            path: self.code_path.clone(),
            content,
        })
    }

    /// Write the exit code file. Callers must hold the entry lock.
    pub async fn write_code(&self, _lock: &EntryLock, code: i32) -> ShcacheResult<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o644);

        let mut file = options.open(&self.code_path).await.map_err(|e| {
            ShcacheError::io(format!("opening {}", self.code_path.display()), e)
        })?;
        let written = match file.write_all(format!("{}\n", code).as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        written
            .map_err(|e| ShcacheError::io(format!("writing {}", self.code_path.display()), e))?;

        debug!("Wrote exit code {} to {}", code, self.code_path.display());
        Ok(())
    }

    /// Remove the exit code file so the entry reads as absent again.
    /// Callers must hold the entry lock.
    pub async fn discard_code(&self, _lock: &EntryLock) -> ShcacheResult<()> {
        match tokio::fs::remove_file(&self.code_path).await {
            Ok(()) => {
                debug!("Removed {}", self.code_path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShcacheError::io(
                format!("removing {}", self.code_path.display()),
                e,
            )),
        }
    }

    /// Current bytes of the content file, ignoring the lock.
    ///
    /// Any I/O error reads as empty content.
    pub async fn peek(&self) -> Vec<u8> {
        tokio::fs::read(&self.content_path).await.unwrap_or_default()
    }

    fn ensure_dir(&self) -> ShcacheResult<()> {
        if let Some(dir) = self.content_path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                ShcacheError::io(format!("creating cache directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }
}

/// Exclusive hold on an entry's content file; released on drop
#[derive(Debug)]
pub struct EntryLock {
    file: File,
    path: PathBuf,
}

impl EntryLock {
    fn new(file: File, path: &Path) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
        }
    }

    /// Async writer over the locked content file.
    ///
    /// The writer shares the open file description, so the lock must outlive it.
    pub fn writer(&self) -> ShcacheResult<ContentWriter> {
        let file = self
            .file
            .try_clone()
            .map_err(|e| ShcacheError::io(format!("cloning handle of {}", self.path.display()), e))?;
        Ok(ContentWriter {
            file: tokio::fs::File::from_std(file),
            path: self.path.clone(),
        })
    }

    /// Read the whole content from the start
    pub fn read_content(&mut self) -> ShcacheResult<String> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut bytes))
            .map_err(|e| ShcacheError::io(format!("reading {}", self.path.display()), e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Writes the content file on behalf of the lock holder
#[derive(Debug)]
pub struct ContentWriter {
    file: tokio::fs::File,
    path: PathBuf,
}

impl ContentWriter {
    /// Discard the previous content
    pub async fn truncate(&mut self) -> ShcacheResult<()> {
        let result = match self.file.set_len(0).await {
            Ok(()) => self.file.seek(SeekFrom::Start(0)).await.map(|_| ()),
            Err(e) => Err(e),
        };
        result.map_err(|e| ShcacheError::io(format!("truncating {}", self.path.display()), e))
    }

    /// Append one line and flush it so concurrent peeks see it
    pub async fn append_line(&mut self, line: &str) -> ShcacheResult<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let result = match self.file.write_all(&bytes).await {
            Ok(()) => self.file.flush().await,
            Err(e) => Err(e),
        };
        result.map_err(|e| ShcacheError::io(format!("appending to {}", self.path.display()), e))
    }

    /// Replace the whole content
    pub async fn replace(&mut self, content: &str) -> ShcacheResult<()> {
        rewrite(&mut self.file, content)
            .await
            .map_err(|e| ShcacheError::io(format!("rewriting {}", self.path.display()), e))
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        trace!("Released lock on {}", self.path.display());
    }
}

async fn rewrite(file: &mut tokio::fs::File, content: &str) -> io::Result<()> {
    file.seek(SeekFrom::Start(0)).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.set_len(content.len() as u64).await
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// First integer-looking token, optionally signed
fn parse_exit_code(text: &str) -> Option<i32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits_len = text[start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len() - start);
    let negative = text[..start].ends_with('-');

    let value: i32 = text[start..start + digits_len].parse().ok()?;
    Some(if negative { -value } else { value })
}
