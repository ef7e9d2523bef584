pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;

use crate::track::SearchHit;

pub use ytdlp::YtDlpProvider;

/// Resultado crudo del extractor: el archivo ya está en disco.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub title: String,
    pub local_file_path: PathBuf,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    pub size_bytes: u64,
}

/// Contrato del colaborador de medios: buscar y descargar.
///
/// Ambas operaciones son lentas (de segundos a minutos) y pueden fallar; el
/// orquestador las envuelve en tiempo límite y vuelo único.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Busca pistas en la fuente.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Descarga el audio de `url` dentro de `dest_dir` y retorna sus datos.
    ///
    /// Un retorno exitoso implica que el archivo existe; que no esté vacío lo
    /// verifica quien llama.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedMedia>;

    /// Verifica si la URL es válida para esta fuente.
    fn is_valid_url(&self, url: &str) -> bool;

    /// Nombre de la fuente.
    fn source_name(&self) -> &'static str;
}
