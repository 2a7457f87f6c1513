//! # Cachecheck
//!
//! A library for finding out which debrid services already host a given
//! set of content identifiers (torrent info-hashes).
//!
//! ## Features
//!
//! - Concurrent per-provider checks, with per-chunk failure isolation
//! - Persistent SQLite TTL cache of earlier verdicts
//! - Progress reporting with cooperative cancellation
//! - Growable OS-thread worker pool for blocking work

pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod pool;
pub mod progress;
pub mod provider;
pub mod utils;

pub use cache::{CacheEntry, CacheStats, ProviderStats, TtlCache};
pub use checker::{CacheChecker, CheckReport, ChunkFailure};
pub use config::CheckerConfig;
pub use error::{CacheError, ChunkError, JobError, PoolError, ProviderError};
pub use pool::{JobResult, Worker, WorkerPool};
pub use progress::{CancelHandle, NoProgress, ProgressBarSink, ProgressSink};
pub use provider::{CacheCheckProvider, Chunking, Provider, UnknownProvider};
