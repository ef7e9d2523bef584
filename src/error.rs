use thiserror::Error;

/// Fallos tipados que el orquestador devuelve al despachador del bot.
///
/// Cloneable a propósito: el mismo desenlace se difunde a todos los que
/// esperan una operación en vuelo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// La búsqueda no produjo resultados aptos.
    #[error("no qualifying tracks found")]
    NotFound,

    /// El colaborador externo falló o agotó el tiempo de espera.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// La descarga terminó mal: archivo vacío/inexistente o error del extractor.
    #[error("download failed: {0}")]
    Download(String),
}
