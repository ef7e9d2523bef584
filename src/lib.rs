//! # songfetch
//!
//! Request-deduplication and caching core for a Telegram music bot.
//!
//! Identical searches and downloads that arrive while an equivalent
//! operation is still running share that single operation, and finished
//! results are cached with a per-entry TTL so repeats skip the upstream
//! service entirely.
//!
//! ## Pieces
//!
//! - [`TrackOrchestrator`]: cache first, then single-flight, then the
//!   upstream provider
//! - [`ExpiringCache`]: TTL cache with lazy expiry and creation-time
//!   eviction
//! - [`SingleFlight`]: at most one in-flight operation per key, result
//!   broadcast to every waiter
//! - [`CacheKey`]: canonical fingerprints for queries and URLs
//! - [`YtDlpProvider`]: concrete provider backed by the yt-dlp binary
//! - [`JsonLibrary`]: per-user persistent track libraries

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod orchestrator;
pub mod singleflight;
pub mod sources;
pub mod storage;
pub mod track;

pub use cache::{CacheStats, ExpiringCache, FileLease, FileLeases, SweepReport, Sweeper};
pub use config::Config;
pub use error::Failure;
pub use fingerprint::CacheKey;
pub use orchestrator::{OrchestratorStats, TrackOrchestrator};
pub use singleflight::SingleFlight;
pub use sources::{FetchedMedia, MediaProvider, YtDlpProvider};
pub use storage::{JsonLibrary, LibraryStore, SavedTrack};
pub use track::{DownloadStatus, DownloadedTrack, SearchHit};
