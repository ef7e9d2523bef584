use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{ExpiringCache, FileLeases};
use crate::fingerprint::CacheKey;
use crate::track::{DownloadedTrack, SearchHit};

/// Resumen de una pasada del barrido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub expired_search_entries: usize,
    pub expired_download_entries: usize,
    pub deleted_files: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired_search_entries + self.expired_download_entries + self.deleted_files
    }
}

/// Barrido periódico: retira las entradas vencidas de ambos cachés y borra
/// del directorio de descargas los archivos viejos sin arriendo vigente.
pub struct Sweeper {
    search_cache: ExpiringCache<CacheKey, Vec<SearchHit>>,
    download_cache: ExpiringCache<CacheKey, DownloadedTrack>,
    leases: FileLeases,
    download_dir: PathBuf,
    file_max_age: Duration,
    interval: Duration,
}

impl Sweeper {
    pub(crate) fn new(
        search_cache: ExpiringCache<CacheKey, Vec<SearchHit>>,
        download_cache: ExpiringCache<CacheKey, DownloadedTrack>,
        leases: FileLeases,
        download_dir: PathBuf,
        file_max_age: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            search_cache,
            download_cache,
            leases,
            download_dir,
            file_max_age,
            interval,
        }
    }

    /// Corre hasta que `shutdown` se cancele. La primera pasada es inmediata.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "🧹 Barrido activo cada {}",
            humantime::format_duration(self.interval)
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("🧹 Barrido detenido");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report.total() > 0 {
                        info!(
                            "🧹 Barrido: {} búsquedas y {} descargas vencidas, {} archivos borrados",
                            report.expired_search_entries,
                            report.expired_download_entries,
                            report.deleted_files
                        );
                    }
                }
            }
        }
    }

    /// Una pasada completa, separada del bucle para poder probarla.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport {
            expired_search_entries: self.search_cache.purge_expired(),
            expired_download_entries: self.download_cache.purge_expired(),
            deleted_files: 0,
        };
        report.deleted_files = self.sweep_files().await;
        report
    }

    /// Borra archivos regulares cuya edad alcanzó `file_max_age`. Un camino
    /// arrendado se deja para una pasada posterior.
    async fn sweep_files(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "No se pudo leer el directorio {}: {}",
                    self.download_dir.display(),
                    err
                );
                return 0;
            }
        };

        let mut deleted = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            if self.leases.is_leased(&path) {
                debug!("Archivo arrendado, se pospone: {}", path.display());
                continue;
            }
            if file_age(&metadata) < self.file_max_age {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Archivo viejo borrado: {}", path.display());
                    deleted += 1;
                }
                Err(err) => warn!("No se pudo borrar {}: {}", path.display(), err),
            }
        }
        deleted
    }
}

fn file_age(metadata: &std::fs::Metadata) -> Duration {
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .unwrap_or(Duration::ZERO)
}
