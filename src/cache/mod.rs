//! Persistent command result cache
//!
//! Each command maps to an entry under the cache directory, addressed by a
//! key derived from the command string. Entries are shared by every process
//! pointing at the same directory and coordinated with advisory locks.
//!
//! # Cache States
//!
//! | State | Action | Description |
//! |-------|--------|-------------|
//! | Fresh | none | Buffer already matches the entry |
//! | NeedsReread | read | Another instance refreshed the entry |
//! | NeedsUpdate | run | Entry missing or older than the timeout |

pub mod key;
pub mod state;
pub mod store;

pub use key::CacheKey;
pub use state::CacheState;
pub use store::{CacheEntry, ContentWriter, EntryLock};
