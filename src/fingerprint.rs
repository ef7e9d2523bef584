use sha2::{Digest, Sha256};
use url::Url;

/// Parámetros de rastreo que no cambian la identidad del contenido.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid", "si", "feature", "ref", "ref_src"];

/// Tipo de operación detrás de una clave.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum KeyKind {
    Search,
    Download,
}

/// Huella estable de una solicitud, usada como clave de caché y de
/// coordinación en vuelo.
///
/// El tipo de operación forma parte de la identidad: una búsqueda y una
/// descarga jamás colisionan aunque el texto crudo coincida. Los campos son
/// privados; solo los constructores de hasheo producen claves, y toda clave
/// carga un digest SHA-256 en hexadecimal.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    kind: KeyKind,
    digest: String,
}

impl CacheKey {
    /// Clave para una búsqueda: texto normalizado y luego hasheado, de modo
    /// que "Daft Punk" y " daft punk " apunten a la misma entrada.
    pub fn for_search(query: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_query(query).as_bytes());
        Self {
            kind: KeyKind::Search,
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Clave para una descarga: URL canonicalizada más, si aplica, la
    /// identidad del usuario solicitante (alcance por usuario).
    pub fn for_download(url: &str, user_id: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonicalize_url(url).as_bytes());
        if let Some(user) = user_id {
            hasher.update(b"\n");
            hasher.update(user.trim().as_bytes());
        }
        Self {
            kind: KeyKind::Download,
            digest: hex::encode(hasher.finalize()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.kind {
            KeyKind::Search => "search",
            KeyKind::Download => "download",
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Prefijo corto del digest, suficiente para logs.
    pub fn short_digest(&self) -> &str {
        &self.digest[..12]
    }
}

/// Minúsculas, solo alfanuméricos y espacios, espacios interiores colapsados.
fn normalize_query(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Forma canónica de una URL: esquema + host + puerto + ruta + parámetros
/// retenidos en orden estable. El fragmento y los parámetros de rastreo se
/// descartan. Una URL que no parsea se usa tal cual (recortada), lo que sigue
/// siendo determinista.
fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.to_string(),
    };

    let mut retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    retained.sort();

    let mut canonical = format!("{}://", parsed.scheme());
    if let Some(host) = parsed.host_str() {
        canonical.push_str(host);
    }
    if let Some(port) = parsed.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(parsed.path());
    if !retained.is_empty() {
        let query = retained
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        canonical.push('?');
        canonical.push_str(&query);
    }
    canonical
}

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}
