//! # Cache Module
//!
//! Expiring cache layer for songfetch.
//!
//! Search results and resolved downloads share the same store type with
//! per-entry TTLs. Expiry is lazy: `get` hides a stale entry without removing
//! it, and the periodic [`Sweeper`] does the physical cleanup, including the
//! audio files on disk that download entries point to.
//!
//! ## Pieces
//!
//! - [`ExpiringCache`]: sharded key/value store with per-entry TTL and
//!   creation-age eviction
//! - [`FileLeases`]: refcounted leases that keep the sweeper away from files
//!   still being sent to a user
//! - [`Sweeper`]: the background pass that purges both caches and the
//!   download directory
//!
//! ## Configuration
//!
//! Cache behavior is controlled via environment variables:
//!
//! ```env
//! SEARCH_TTL=20m              # Lifetime of cached search results
//! DOWNLOAD_TTL=1h             # Lifetime of cached downloads
//! MAX_CACHE_ENTRIES=1000      # Capacity per store
//! SWEEP_INTERVAL=1h           # Pause between sweep passes
//! FILE_MAX_AGE=1h             # Disk age before audio files are reclaimed
//! ```

pub mod leases;
pub mod store;
pub mod sweep;

pub use leases::{FileLease, FileLeases};
pub use store::{CacheStats, ExpiringCache};
pub use sweep::{SweepReport, Sweeper};
