use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registro de arriendos sobre archivos descargados.
///
/// Mientras un envío al usuario esté en curso el camino queda arrendado y el
/// barrido pospone su borrado a una pasada posterior.
#[derive(Debug, Clone, Default)]
pub struct FileLeases {
    active: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl FileLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toma un arriendo sobre `path`; se libera al soltar el guard.
    pub fn lease(&self, path: impl Into<PathBuf>) -> FileLease {
        let path = path.into();
        {
            let mut active = self.active.lock();
            *active.entry(path.clone()).or_insert(0) += 1;
        }
        FileLease {
            path,
            registry: Arc::clone(&self.active),
        }
    }

    pub fn is_leased(&self, path: &Path) -> bool {
        self.active.lock().contains_key(path)
    }

    /// Cantidad de caminos con arriendos vivos.
    pub fn active_paths(&self) -> usize {
        self.active.lock().len()
    }
}

/// Guard RAII de un arriendo; el conteo baja al soltarlo.
#[derive(Debug)]
pub struct FileLease {
    path: PathBuf,
    registry: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl FileLease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        let mut active = self.registry.lock();
        if let Some(count) = active.get_mut(&self.path) {
            *count -= 1;
            if *count == 0 {
                active.remove(&self.path);
            }
        }
    }
}
