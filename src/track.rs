use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resultado individual de una búsqueda, ya filtrado y listo para cachear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identificador provisto por la fuente (p. ej. el video id).
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    /// URL canónica de la pista en la fuente.
    pub source_url: String,
}

impl SearchHit {
    /// Acepta pistas sin duración declarada; las demás deben caer en rango.
    pub fn duration_allowed(&self, min_seconds: u64, max_seconds: u64) -> bool {
        match self.duration_seconds {
            Some(secs) => secs >= min_seconds && secs <= max_seconds,
            None => true,
        }
    }
}

/// Estado de una descarga resuelta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Completed,
    Cached,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Cached => "cached",
            DownloadStatus::Failed => "failed",
        }
    }
}

/// Descarga resuelta que el orquestador entrega al despachador.
///
/// El archivo local pertenece al barrido de limpieza, no a este registro:
/// la entrada de caché puede sobrevivir al archivo y viceversa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadedTrack {
    pub title: String,
    pub local_file_path: PathBuf,
    /// URL pública desde la que el bot sirve el archivo.
    pub public_file_url: String,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    pub size_megabytes: f64,
    pub status: DownloadStatus,
}
