use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::track::DownloadedTrack;

/// Pista guardada en la librería personal de un usuario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrack {
    pub title: String,
    pub public_file_url: String,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl SavedTrack {
    pub fn from_download(track: &DownloadedTrack) -> Self {
        Self {
            title: track.title.clone(),
            public_file_url: track.public_file_url.clone(),
            duration_seconds: track.duration_seconds,
            uploader: track.uploader.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Contrato de persistencia para las librerías de usuario
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Guarda una pista; devuelve `false` si ya estaba en la librería.
    async fn save_track(&self, user_id: &str, track: &SavedTrack) -> Result<bool>;

    /// Pistas guardadas del usuario, en orden de guardado.
    async fn tracks_for(&self, user_id: &str) -> Result<Vec<SavedTrack>>;
}

/// Librerías basadas en archivos JSON, una por usuario
pub struct JsonLibrary {
    data_dir: PathBuf,
    users: Mutex<HashMap<String, Vec<SavedTrack>>>,
}

impl JsonLibrary {
    pub async fn open(data_dir: PathBuf) -> Result<Self> {
        let users_dir = data_dir.join("users");
        fs::create_dir_all(&users_dir).await?;

        info!("📁 Librería inicializada en: {}", data_dir.display());

        let library = Self {
            data_dir,
            users: Mutex::new(HashMap::new()),
        };
        library.load_all_users().await?;

        Ok(library)
    }

    async fn load_all_users(&self) -> Result<()> {
        let users_dir = self.data_dir.join("users");
        let mut files = fs::read_dir(&users_dir).await?;
        let mut loaded_count = 0;
        let mut users = self.users.lock().await;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();

            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(user_id) = path.file_stem().and_then(|n| n.to_str()) {
                    match fs::read_to_string(&path).await {
                        Ok(content) => match serde_json::from_str::<Vec<SavedTrack>>(&content) {
                            Ok(tracks) => {
                                users.insert(user_id.to_string(), tracks);
                                loaded_count += 1;
                            }
                            Err(e) => {
                                warn!("Error parseando librería de {}: {}", user_id, e);
                            }
                        },
                        Err(e) => {
                            warn!("Error leyendo librería de {}: {}", user_id, e);
                        }
                    }
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} librerías de usuario", loaded_count);
        }

        Ok(())
    }

    async fn persist(&self, user_id: &str, tracks: &[SavedTrack]) -> Result<()> {
        let file_path = self.user_file_path(user_id);
        let content = serde_json::to_string_pretty(tracks)?;
        fs::write(&file_path, content)
            .await
            .with_context(|| format!("Error guardando librería en {}", file_path.display()))?;
        Ok(())
    }

    fn user_file_path(&self, user_id: &str) -> PathBuf {
        // Solo caracteres seguros del id en el nombre de archivo
        let safe: String = user_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        self.data_dir.join("users").join(format!("{}.json", safe))
    }
}

#[async_trait]
impl LibraryStore for JsonLibrary {
    async fn save_track(&self, user_id: &str, track: &SavedTrack) -> Result<bool> {
        let mut users = self.users.lock().await;
        let tracks = users.entry(user_id.to_string()).or_default();

        if tracks
            .iter()
            .any(|t| t.public_file_url == track.public_file_url)
        {
            debug!("Pista ya guardada para {}: {}", user_id, track.title);
            return Ok(false);
        }

        tracks.push(track.clone());
        // El lock se mantiene durante la escritura: guardados al mismo
        // archivo quedan serializados
        self.persist(user_id, tracks).await?;

        info!("💾 Pista guardada para {}: {}", user_id, track.title);
        Ok(true)
    }

    async fn tracks_for(&self, user_id: &str) -> Result<Vec<SavedTrack>> {
        let users = self.users.lock().await;
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }
}
