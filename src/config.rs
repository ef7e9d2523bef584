use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Cachés
    pub search_ttl: Duration,
    pub download_ttl: Duration,
    pub max_cache_entries: usize,

    // Búsqueda
    pub search_limit: usize,
    pub min_track_seconds: u64, // Piso para descartar clips
    pub max_track_seconds: u64,

    // Descargas
    pub download_dir: PathBuf,
    pub public_base_url: String,
    pub per_user_downloads: bool, // Alcance del caché de descargas
    pub request_timeout: Duration,

    // Librería de usuarios
    pub data_dir: PathBuf,

    // Barrido
    pub sweep_interval: Duration,
    pub file_max_age: Duration,

    // Extractor
    pub ytdlp_bin: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Cachés
            search_ttl: env_duration("SEARCH_TTL", "20m")?,
            download_ttl: env_duration("DOWNLOAD_TTL", "1h")?,
            max_cache_entries: std::env::var("MAX_CACHE_ENTRIES")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Búsqueda
            search_limit: std::env::var("SEARCH_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            min_track_seconds: std::env::var("MIN_TRACK_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            max_track_seconds: std::env::var("MAX_TRACK_SECONDS")
                .unwrap_or_else(|_| "900".to_string()) // 15 minutos
                .parse()?,

            // Descargas
            download_dir: std::env::var("DOWNLOAD_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/files".to_string()),
            per_user_downloads: std::env::var("PER_USER_DOWNLOADS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            request_timeout: env_duration("REQUEST_TIMEOUT", "30s")?,

            // Librería de usuarios
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),

            // Barrido
            sweep_interval: env_duration("SWEEP_INTERVAL", "1h")?,
            file_max_age: env_duration("FILE_MAX_AGE", "1h")?,

            // Extractor
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        std::fs::create_dir_all(&config.download_dir)?;
        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - TTLs and the request timeout must be non-zero
    /// - Sweep interval and file max age must be non-zero
    /// - Cache capacity and search limit must be greater than 0
    /// - The track duration window must not be inverted
    /// - Public base URL and extractor binary must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.search_ttl.is_zero() || self.download_ttl.is_zero() {
            anyhow::bail!("Cache TTLs must be greater than zero");
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("Request timeout must be greater than zero");
        }
        // tokio::time::interval entra en pánico con período cero
        if self.sweep_interval.is_zero() || self.file_max_age.is_zero() {
            anyhow::bail!("Sweep interval and file max age must be greater than zero");
        }
        if self.max_cache_entries == 0 {
            anyhow::bail!("Max cache entries must be greater than 0");
        }
        if self.search_limit == 0 {
            anyhow::bail!("Search limit must be greater than 0");
        }
        if self.min_track_seconds >= self.max_track_seconds {
            anyhow::bail!(
                "Track duration window is inverted: {}s >= {}s",
                self.min_track_seconds,
                self.max_track_seconds
            );
        }
        if self.public_base_url.trim().is_empty() {
            anyhow::bail!("Public base URL must not be empty");
        }
        if self.ytdlp_bin.trim().is_empty() {
            anyhow::bail!("Extractor binary name must not be empty");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Caches: search {} / download {}, {} entries max\n  \
            Search: limit {}, duration {}-{}s\n  \
            Downloads: {} (per-user: {}), timeout {}\n  \
            Library: {}\n  \
            Sweep: every {}, file max age {}\n  \
            Extractor: {}",
            humantime::format_duration(self.search_ttl),
            humantime::format_duration(self.download_ttl),
            self.max_cache_entries,
            self.search_limit,
            self.min_track_seconds,
            self.max_track_seconds,
            self.download_dir.display(),
            self.per_user_downloads,
            humantime::format_duration(self.request_timeout),
            self.data_dir.display(),
            humantime::format_duration(self.sweep_interval),
            humantime::format_duration(self.file_max_age),
            self.ytdlp_bin,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Cachés
            search_ttl: Duration::from_secs(20 * 60),
            download_ttl: Duration::from_secs(60 * 60),
            max_cache_entries: 1000,

            // Búsqueda
            search_limit: 10,
            min_track_seconds: 60,
            max_track_seconds: 900, // 15 minutos

            // Descargas
            download_dir: "downloads".into(),
            public_base_url: "http://localhost:8080/files".to_string(),
            per_user_downloads: true,
            request_timeout: Duration::from_secs(30),

            // Librería de usuarios
            data_dir: "data".into(),

            // Barrido
            sweep_interval: Duration::from_secs(60 * 60),
            file_max_age: Duration::from_secs(60 * 60),

            // Extractor
            ytdlp_bin: "yt-dlp".to_string(),
        }
    }
}

fn env_duration(name: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(&raw).with_context(|| format!("{} no es una duración válida: {}", name, raw))
}
