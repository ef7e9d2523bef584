use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ExpiringCache, FileLease, FileLeases, Sweeper};
use crate::config::Config;
use crate::error::Failure;
use crate::fingerprint::CacheKey;
use crate::singleflight::SingleFlight;
use crate::sources::{FetchedMedia, MediaProvider};
use crate::track::{DownloadStatus, DownloadedTrack, SearchHit};

/// Orquestador de solicitudes: caché primero, después vuelo único, y recién
/// entonces el colaborador externo.
///
/// Posee ambos cachés y ambos coordinadores durante toda la vida del proceso;
/// clonar el orquestador comparte ese estado.
#[derive(Clone)]
pub struct TrackOrchestrator {
    provider: Arc<dyn MediaProvider>,
    config: Arc<Config>,
    search_cache: ExpiringCache<CacheKey, Vec<SearchHit>>,
    download_cache: ExpiringCache<CacheKey, DownloadedTrack>,
    search_flights: SingleFlight<CacheKey, Vec<SearchHit>>,
    download_flights: SingleFlight<CacheKey, DownloadedTrack>,
    leases: FileLeases,
}

impl TrackOrchestrator {
    pub fn new(provider: Arc<dyn MediaProvider>, config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            provider,
            search_cache: ExpiringCache::new(config.max_cache_entries),
            download_cache: ExpiringCache::new(config.max_cache_entries),
            search_flights: SingleFlight::new(),
            download_flights: SingleFlight::new(),
            leases: FileLeases::new(),
            config,
        }
    }

    /// Busca pistas para `query`.
    ///
    /// Camino caliente: el caché responde sin tocar al coordinador. En un
    /// fallo el caché queda intacto, así el siguiente intento vuelve a la
    /// fuente.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, Failure> {
        let key = CacheKey::for_search(query);
        if let Some(hits) = self.search_cache.get(&key) {
            debug!("Búsqueda servida desde caché ({})", key.short_digest());
            return Ok(hits);
        }

        let provider = Arc::clone(&self.provider);
        let config = Arc::clone(&self.config);
        let cache = self.search_cache.clone();
        let flight_key = key.clone();
        let query = query.trim().to_string();

        self.search_flights
            .run(key, move || async move {
                info!("🔍 Buscando en {}: {}", provider.source_name(), query);
                let raw = timeout(
                    config.request_timeout,
                    provider.search(&query, config.search_limit),
                )
                .await
                .map_err(|_| {
                    Failure::Upstream(format!(
                        "search timed out after {}s",
                        config.request_timeout.as_secs()
                    ))
                })?
                .map_err(|err| Failure::Upstream(err.to_string()))?;

                let total = raw.len();
                let mut hits: Vec<SearchHit> = raw
                    .into_iter()
                    .filter(|hit| {
                        hit.duration_allowed(config.min_track_seconds, config.max_track_seconds)
                    })
                    .collect();
                hits.truncate(config.search_limit);

                if hits.is_empty() {
                    debug!("Sin resultados aptos ({} crudos) para: {}", total, query);
                    return Err(Failure::NotFound);
                }

                info!("✅ {} resultados aptos de {} para: {}", hits.len(), total, query);
                cache.put(flight_key, hits.clone(), config.search_ttl);
                Ok(hits)
            })
            .await
    }

    /// Descarga la pista de `url` para `user_id`, reutilizando una descarga
    /// previa mientras su archivo siga en disco.
    pub async fn download(&self, url: &str, user_id: &str) -> Result<DownloadedTrack, Failure> {
        let key = self.download_key(url, user_id);

        if let Some(track) = self.download_cache.get(&key) {
            if file_is_usable(&track.local_file_path).await {
                debug!("Descarga servida desde caché ({})", key.short_digest());
                return Ok(DownloadedTrack {
                    status: DownloadStatus::Cached,
                    ..track
                });
            }
            // Autocuración: la entrada apunta a un archivo que el barrido ya retiró
            warn!(
                "⚠️ Entrada de caché sin archivo, se invalida: {}",
                track.local_file_path.display()
            );
            self.download_cache.delete(&key);
        }

        let provider = Arc::clone(&self.provider);
        let config = Arc::clone(&self.config);
        let cache = self.download_cache.clone();
        let flight_key = key.clone();
        let url = url.to_string();

        self.download_flights
            .run(key, move || async move {
                info!("⬇️ Descargando: {}", url);
                let media = timeout(
                    config.request_timeout,
                    provider.fetch(&url, &config.download_dir),
                )
                .await
                .map_err(|_| {
                    Failure::Upstream(format!(
                        "download timed out after {}s",
                        config.request_timeout.as_secs()
                    ))
                })?
                .map_err(|err| Failure::Download(err.to_string()))?;

                let track = finish_download(media, &config).await?;
                // El put va dentro del vuelo: aunque todos los llamadores se
                // cancelen, el resultado queda cacheado para los siguientes
                cache.put(flight_key, track.clone(), config.download_ttl);
                info!(
                    "💾 Descarga lista: {} ({:.2} MB)",
                    track.title, track.size_megabytes
                );
                Ok(track)
            })
            .await
    }

    /// Invalida una búsqueda cacheada. `true` si había entrada.
    pub fn invalidate_search(&self, query: &str) -> bool {
        self.search_cache.delete(&CacheKey::for_search(query))
    }

    /// Invalida una descarga cacheada, por ejemplo cuando falló el guardado
    /// posterior en la librería del usuario y conviene forzar la re-descarga.
    pub fn invalidate_download(&self, url: &str, user_id: &str) -> bool {
        self.download_cache.delete(&self.download_key(url, user_id))
    }

    /// Arrienda un archivo mientras se envía al usuario; el barrido no lo
    /// borra hasta que el guard se suelte.
    pub fn lease_file(&self, path: impl Into<PathBuf>) -> FileLease {
        self.leases.lease(path)
    }

    /// Construye el barrido periódico asociado a estos cachés.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.search_cache.clone(),
            self.download_cache.clone(),
            self.leases.clone(),
            self.config.download_dir.clone(),
            self.config.file_max_age,
            self.config.sweep_interval,
        )
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            search: self.search_cache.stats(),
            downloads: self.download_cache.stats(),
            in_flight: self.search_flights.in_flight() + self.download_flights.in_flight(),
            leased_files: self.leases.active_paths(),
        }
    }

    fn download_key(&self, url: &str, user_id: &str) -> CacheKey {
        let scope = self.config.per_user_downloads.then_some(user_id);
        CacheKey::for_download(url, scope)
    }
}

/// Fotografía del estado interno, para logs y pruebas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub search: CacheStats,
    pub downloads: CacheStats,
    pub in_flight: usize,
    pub leased_files: usize,
}

/// Verifica el archivo contra el disco y arma el registro final.
async fn finish_download(media: FetchedMedia, config: &Config) -> Result<DownloadedTrack, Failure> {
    let size_bytes = tokio::fs::metadata(&media.local_file_path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    if size_bytes == 0 {
        let _ = tokio::fs::remove_file(&media.local_file_path).await;
        return Err(Failure::Download(format!(
            "downloaded file is empty or missing: {}",
            media.local_file_path.display()
        )));
    }

    Ok(DownloadedTrack {
        title: media.title,
        public_file_url: public_file_url(&config.public_base_url, &media.local_file_path),
        local_file_path: media.local_file_path,
        duration_seconds: media.duration_seconds,
        uploader: media.uploader,
        size_megabytes: size_bytes as f64 / (1024.0 * 1024.0),
        status: DownloadStatus::Completed,
    })
}

async fn file_is_usable(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// URL pública bajo la que el bot sirve el archivo descargado.
fn public_file_url(base_url: &str, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", base_url.trim_end_matches('/'), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockMediaProvider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::time::{sleep, Duration};

    fn test_config(dir: &TempDir) -> Config {
        Config {
            download_dir: dir.path().to_path_buf(),
            public_base_url: "https://files.example.org".to_string(),
            ..Config::default()
        }
    }

    fn hit(id: &str, duration: Option<u64>) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            title: format!("Track {}", id),
            duration_seconds: duration,
            uploader: Some("Uploader".to_string()),
            source_url: format!("https://www.youtube.com/watch?v={}", id),
        }
    }

    /// Fuente de prueba con latencia controlada; escribe archivos reales.
    struct StubProvider {
        hits: Vec<SearchHit>,
        delay: Duration,
        payload: Vec<u8>,
        search_calls: Arc<AtomicUsize>,
        fetch_calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn new(hits: Vec<SearchHit>, delay: Duration) -> Self {
            Self {
                hits,
                delay,
                payload: b"stub-audio-bytes".to_vec(),
                search_calls: Arc::new(AtomicUsize::new(0)),
                fetch_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_payload(mut self, payload: &[u8]) -> Self {
            self.payload = payload.to_vec();
            self
        }
    }

    #[async_trait]
    impl MediaProvider for StubProvider {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<SearchHit>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            Ok(self.hits.clone())
        }

        async fn fetch(&self, url: &str, dest_dir: &Path) -> anyhow::Result<FetchedMedia> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            let stem: String = url.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            let path = dest_dir.join(format!("{}.mp3", stem));
            tokio::fs::write(&path, &self.payload).await?;
            Ok(FetchedMedia {
                title: "Stub Track".to_string(),
                local_file_path: path,
                duration_seconds: Some(180),
                uploader: Some("Stub".to_string()),
                size_bytes: self.payload.len() as u64,
            })
        }

        fn is_valid_url(&self, _url: &str) -> bool {
            true
        }

        fn source_name(&self) -> &'static str {
            "stub"
        }
    }

    #[tokio::test]
    async fn test_search_hits_cache_and_absorbs_query_shape() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![hit("a", Some(200)), hit("b", Some(300))]));
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        let first = orchestrator.search("daft punk").await.unwrap();
        // Misma clave tras normalizar: no hay segunda llamada a la fuente
        let second = orchestrator.search(" DAFT  Punk ").await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_search_filters_by_duration_and_keeps_unknown() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider.expect_search().times(1).returning(|_, _| {
            Ok(vec![
                hit("short", Some(30)),
                hit("ok", Some(200)),
                hit("unknown", None),
                hit("long", Some(950)),
            ])
        });
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        let hits = orchestrator.search("query").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "unknown"]);
    }

    #[tokio::test]
    async fn test_search_truncates_to_limit() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider.expect_search().times(1).returning(|_, _| {
            Ok((0..6).map(|i| hit(&format!("t{}", i), Some(120))).collect())
        });
        let config = Config {
            search_limit: 3,
            ..test_config(&dir)
        };
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), config);

        let hits = orchestrator.search("query").await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_search_empty_results_are_not_found() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider.expect_search().times(1).returning(|_, _| Ok(vec![]));
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        assert_eq!(
            orchestrator.search("nada").await,
            Err(Failure::NotFound)
        );
    }

    #[tokio::test]
    async fn test_search_all_filtered_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![hit("clip", Some(15))]));
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        assert_eq!(
            orchestrator.search("solo clips").await,
            Err(Failure::NotFound)
        );
    }

    #[tokio::test]
    async fn test_search_upstream_error_is_typed() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("api caída")));
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        match orchestrator.search("query").await {
            Err(Failure::Upstream(msg)) => assert!(msg.contains("api caída")),
            other => panic!("se esperaba Upstream, llegó {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_failures_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut provider = MockMediaProvider::new();
        let counter = Arc::clone(&attempts);
        provider.expect_search().times(2).returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("transitorio"))
            } else {
                Ok(vec![hit("a", Some(120))])
            }
        });
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        assert!(orchestrator.search("retry me").await.is_err());
        let hits = orchestrator.search("retry me").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_search_times_out_as_upstream() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(
            vec![hit("a", Some(120))],
            Duration::from_secs(120),
        ));
        let config = Config {
            request_timeout: Duration::from_secs(5),
            ..test_config(&dir)
        };
        let orchestrator = TrackOrchestrator::new(provider, config);

        match orchestrator.search("lenta").await {
            Err(Failure::Upstream(msg)) => assert!(msg.contains("timed out")),
            other => panic!("se esperaba timeout Upstream, llegó {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_concurrent_searches_share_one_flight() {
        let dir = TempDir::new().unwrap();
        let hits: Vec<SearchHit> = (0..5).map(|i| hit(&format!("r{}", i), Some(120))).collect();
        let provider = Arc::new(StubProvider::new(hits, Duration::from_millis(500)));
        let search_calls = Arc::clone(&provider.search_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move { orchestrator.search("lofi").await }));
        }
        let results: Vec<Vec<SearchHit>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(results[0].len(), 5);
        assert!(results.iter().all(|r| *r == results[0]));

        // Un cuarto llamador posterior resuelve desde caché, sin nueva llamada
        let fourth = orchestrator.search("lofi").await.unwrap();
        assert_eq!(fourth, results[0]);
        assert_eq!(search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_downloads_invoke_extractor_once() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::from_millis(100)));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://www.youtube.com/watch?v=abc123";

        let mut handles = Vec::new();
        for _ in 0..3 {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move { orchestrator.download(url, "42").await }));
        }
        let results: Vec<DownloadedTrack> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == results[0]));
        assert_eq!(results[0].status, DownloadStatus::Completed);

        // Repetir después del vuelo entrega la copia cacheada
        let again = orchestrator.download(url, "42").await.unwrap();
        assert_eq!(again.status, DownloadStatus::Cached);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_builds_record_from_disk() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::ZERO));
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));

        let track = orchestrator
            .download("https://youtu.be/xyz9", "7")
            .await
            .unwrap();

        assert_eq!(track.status, DownloadStatus::Completed);
        assert_eq!(track.title, "Stub Track");
        assert!(track.local_file_path.exists());
        assert_eq!(
            track.public_file_url,
            "https://files.example.org/httpsyoutubexyz9.mp3"
        );
        assert!(track.size_megabytes > 0.0);
    }

    #[tokio::test]
    async fn test_download_self_heals_when_file_vanishes() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::ZERO));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://www.youtube.com/watch?v=gone1";

        let first = orchestrator.download(url, "42").await.unwrap();
        tokio::fs::remove_file(&first.local_file_path).await.unwrap();

        // El barrido se llevó el archivo: la entrada se invalida y se rehace
        let second = orchestrator.download(url, "42").await.unwrap();
        assert_eq!(second.status, DownloadStatus::Completed);
        assert!(second.local_file_path.exists());
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_download_empty_file_is_failure_and_not_cached() {
        let dir = TempDir::new().unwrap();
        let provider =
            Arc::new(StubProvider::new(vec![], Duration::ZERO).with_payload(b""));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://youtu.be/empty";

        match orchestrator.download(url, "42").await {
            Err(Failure::Download(msg)) => assert!(msg.contains("empty")),
            other => panic!("se esperaba Download, llegó {:?}", other),
        }

        // El fallo no queda cacheado: el siguiente intento vuelve al extractor
        let _ = orchestrator.download(url, "42").await;
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_download_provider_error_is_typed() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMediaProvider::new();
        provider
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("yt-dlp explotó")));
        let orchestrator = TrackOrchestrator::new(Arc::new(provider), test_config(&dir));

        match orchestrator.download("https://youtu.be/err", "42").await {
            Err(Failure::Download(msg)) => assert!(msg.contains("yt-dlp explotó")),
            other => panic!("se esperaba Download, llegó {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_per_user_scope_separates_downloads() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::ZERO));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://youtu.be/shared";

        orchestrator.download(url, "alice").await.unwrap();
        orchestrator.download(url, "bob").await.unwrap();
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);

        // Mismo usuario repite: caché
        let repeat = orchestrator.download(url, "alice").await.unwrap();
        assert_eq!(repeat.status, DownloadStatus::Cached);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_global_scope_shares_downloads_between_users() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::ZERO));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let config = Config {
            per_user_downloads: false,
            ..test_config(&dir)
        };
        let orchestrator = TrackOrchestrator::new(provider, config);
        let url = "https://youtu.be/shared";

        orchestrator.download(url, "alice").await.unwrap();
        let second = orchestrator.download(url, "bob").await.unwrap();

        assert_eq!(second.status, DownloadStatus::Cached);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_download_forces_refetch() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::ZERO));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://youtu.be/save-failed";

        orchestrator.download(url, "42").await.unwrap();
        assert!(orchestrator.invalidate_download(url, "42"));

        let fresh = orchestrator.download(url, "42").await.unwrap();
        assert_eq!(fresh.status, DownloadStatus::Completed);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_caller_still_populates_cache() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(vec![], Duration::from_millis(100)));
        let fetch_calls = Arc::clone(&provider.fetch_calls);
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));
        let url = "https://youtu.be/abandoned";

        let caller = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.download(url, "42").await })
        };
        sleep(Duration::from_millis(20)).await;
        caller.abort();
        let _ = caller.await;

        // La operación siguió sola y dejó el caché poblado
        sleep(Duration::from_millis(150)).await;
        let track = orchestrator.download(url, "42").await.unwrap();
        assert_eq!(track.status, DownloadStatus::Cached);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stats_reflect_state() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(StubProvider::new(
            vec![hit("a", Some(120))],
            Duration::ZERO,
        ));
        let orchestrator = TrackOrchestrator::new(provider, test_config(&dir));

        orchestrator.search("lofi").await.unwrap();
        let track = orchestrator
            .download("https://youtu.be/stat", "42")
            .await
            .unwrap();

        let lease = orchestrator.lease_file(&track.local_file_path);
        let stats = orchestrator.stats();
        assert_eq!(stats.search.live, 1);
        assert_eq!(stats.downloads.live, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.leased_files, 1);

        drop(lease);
        assert_eq!(orchestrator.stats().leased_files, 0);
    }

    #[test]
    fn test_public_file_url_joins_cleanly() {
        let path = PathBuf::from("/tmp/downloads/song.mp3");
        assert_eq!(
            public_file_url("https://files.example.org/", &path),
            "https://files.example.org/song.mp3"
        );
        assert_eq!(
            public_file_url("https://files.example.org", &path),
            "https://files.example.org/song.mp3"
        );
    }
}
