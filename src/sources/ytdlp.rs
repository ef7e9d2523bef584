use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{FetchedMedia, MediaProvider};
use crate::track::SearchHit;

/// Fuente concreta respaldada por el binario yt-dlp
pub struct YtDlpProvider {
    bin: String,
    rate_limiter: Semaphore,
}

/// Entrada que yt-dlp emite por línea con --dump-json
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: String,
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YtDlpProvider {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            // Limitar procesos concurrentes para evitar rate limiting
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Versión instalada del binario, para el chequeo de salud.
    pub async fn version(&self) -> Result<String> {
        let stdout = self.run(&["--version"]).await?;
        Ok(stdout.trim().to_string())
    }

    /// Verifica si una URL apunta a YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        let youtube_regex = Regex::new(
            r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/)|youtu\.be/|music\.youtube\.com/)"
        ).unwrap();

        youtube_regex.is_match(url)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Error al ejecutar {}", self.bin))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn entry_to_hit(entry: YtDlpEntry) -> SearchHit {
        // Con --flat-playlist no siempre viene webpage_url
        let source_url = entry
            .webpage_url
            .or(entry.url)
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", entry.id));
        SearchHit {
            id: entry.id,
            title: entry.title,
            duration_seconds: entry.duration.map(|d| d as u64),
            uploader: entry.uploader,
            source_url,
        }
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let _permit = self.rate_limiter.acquire().await?;

        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", limit, query);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        let mut results = Vec::new();
        for line in stdout.lines() {
            if let Ok(entry) = serde_json::from_str::<YtDlpEntry>(line) {
                results.push(Self::entry_to_hit(entry));
            }
        }

        debug!("yt-dlp devolvió {} entradas para: {}", results.len(), query);
        Ok(results)
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedMedia> {
        let _permit = self.rate_limiter.acquire().await?;

        debug!("📊 Obteniendo metadata de: {}", url);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                url,
            ])
            .await?;
        let entry: YtDlpEntry =
            serde_json::from_str(stdout.trim()).context("Error al parsear respuesta de yt-dlp")?;

        let stem: String = entry
            .id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if stem.is_empty() {
            anyhow::bail!("yt-dlp devolvió un id vacío para: {}", url);
        }
        let template = dest_dir.join(format!("{}.%(ext)s", stem));
        let template = template.to_string_lossy().into_owned();
        let final_path = dest_dir.join(format!("{}.mp3", stem));

        info!("⬇️ Extrayendo audio de: {}", url);

        self.run(&[
            "--no-playlist",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "0",
            "--no-warnings",
            "-o",
            &template,
            url,
        ])
        .await?;

        let metadata = tokio::fs::metadata(&final_path)
            .await
            .with_context(|| format!("yt-dlp no produjo el archivo {}", final_path.display()))?;

        Ok(FetchedMedia {
            title: entry.title,
            local_file_path: final_path,
            duration_seconds: entry.duration.map(|d| d as u64),
            uploader: entry.uploader,
            size_bytes: metadata.len(),
        })
    }

    fn is_valid_url(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}
