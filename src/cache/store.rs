use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Entrada con su ventana de validez.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Caché genérica con TTL por entrada y expiración perezosa.
///
/// `get` nunca borra: una entrada vencida es invisible para los lectores pero
/// sigue almacenada hasta que `purge_expired` (invocado por el barrido
/// periódico) la retire. El camino caliente queda así en O(1) sin contención
/// adicional.
#[derive(Debug)]
pub struct ExpiringCache<K: Clone + Eq + Hash, V> {
    entries: Arc<DashMap<K, CacheEntry<V>>>,
    max_entries: usize,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    /// `None` si la clave falta o la entrada ya venció.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Sobrescribe cualquier entrada previa y reinicia su ventana de validez.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Invalidación explícita. `true` si había entrada.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Retira físicamente las entradas vencidas y retorna cuántas fueron.
    pub fn purge_expired(&self) -> usize {
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter_map(|entry| {
                if entry.value().is_expired() {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let mut removed = 0;
        for key in stale {
            // remove_if evita borrar una entrada reescrita entre el escaneo y aquí
            if self
                .entries
                .remove_if(&key, |_, entry| entry.is_expired())
                .is_some()
            {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Limpiadas {} entradas vencidas del caché", removed);
        }
        removed
    }

    /// Número de entradas almacenadas, vencidas incluidas.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut live = 0;
        let mut expired = 0;
        for entry in self.entries.iter() {
            if entry.value().is_expired() {
                expired += 1;
            } else {
                live += 1;
            }
        }
        CacheStats {
            entries: live + expired,
            live,
            expired,
            capacity: self.max_entries,
        }
    }

    /// Libera espacio: primero lo vencido, y si no alcanza, el cuarto más
    /// antiguo por fecha de creación. No es LRU: releer una entrada no
    /// prolonga su vida.
    fn make_room(&self) {
        self.purge_expired();
        if self.entries.len() < self.max_entries {
            return;
        }

        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        let evict = (self.max_entries / 4).max(1);
        for (key, _) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        debug!("Desalojadas {} entradas por antigüedad", evict);
    }
}

impl<K: Clone + Eq + Hash, V> Clone for ExpiringCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            max_entries: self.max_entries,
        }
    }
}

/// Conteos instantáneos del caché, para logs y pruebas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub live: usize,
    pub expired: usize,
    pub capacity: usize,
}
