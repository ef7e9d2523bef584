use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::error::Failure;

/// Ranura de difusión de una operación en vuelo.
#[derive(Debug)]
struct Flight<T> {
    outcome: watch::Receiver<Option<Result<T, Failure>>>,
    waiters: Arc<AtomicUsize>,
}

impl<T> Clone for Flight<T> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            waiters: Arc::clone(&self.waiters),
        }
    }
}

/// Coordinador de vuelo único: a lo sumo una operación en curso por clave.
///
/// El primer llamador lanza la operación como tarea desprendida; quienes
/// llegan mientras corre se cuelgan del mismo canal y reciben el mismo
/// desenlace, éxito o fallo. Cancelar a un llamador, el iniciador incluido,
/// nunca cancela la operación compartida.
#[derive(Debug)]
pub struct SingleFlight<K: Clone + Eq + Hash, T> {
    flights: Arc<DashMap<K, Flight<T>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Ejecuta `operation` para `key`, o espera la ejecución ya en curso.
    ///
    /// El registro se retira recién después de publicar el desenlace, de modo
    /// que un llamador tardío o bien se cuelga de un vuelo vivo o bien llega
    /// cuando la operación ya dejó su resultado a la vista. Si la operación
    /// entra en pánico, el registro se retira igual y quienes esperan reciben
    /// un fallo; la clave queda libre para reintentar.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> Result<T, Failure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        let flight = match self.flights.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!("Llamador adherido a un vuelo en curso");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let (publisher, outcome) = watch::channel(None);
                let flight = Flight {
                    outcome,
                    waiters: Arc::new(AtomicUsize::new(0)),
                };
                slot.insert(flight.clone());

                // El guard retira el registro al caer, con o sin pánico de
                // por medio; la clave nunca queda atada a un vuelo muerto
                let cleanup = RecordGuard::new(Arc::clone(&self.flights), key.clone());
                let work = operation();
                tokio::spawn(async move {
                    let outcome = work.await;
                    // Publicar antes de retirar el registro
                    let _ = publisher.send(Some(outcome));
                    drop(cleanup);
                });
                flight
            }
        };

        let _waiting = WaiterGuard::attach(&flight.waiters);
        await_outcome(flight.outcome).await
    }

    /// Llamadores colgados de la clave en este instante.
    pub fn waiter_count(&self, key: &K) -> usize {
        self.flights
            .get(key)
            .map(|flight| flight.waiters.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Vuelos en curso.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

impl<K: Clone + Eq + Hash, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn await_outcome<T: Clone>(
    mut outcome: watch::Receiver<Option<Result<T, Failure>>>,
) -> Result<T, Failure> {
    loop {
        if let Some(result) = outcome.borrow_and_update().clone() {
            return result;
        }
        if outcome.changed().await.is_err() {
            // El emisor se soltó; el valor final pudo llegar igual
            return match outcome.borrow().clone() {
                Some(result) => result,
                None => Err(Failure::Upstream(
                    "in-flight operation vanished".to_string(),
                )),
            };
        }
    }
}

/// Retira el registro del vuelo al soltarse, incluso durante el desenrollado
/// de un pánico en la operación.
struct RecordGuard<K: Eq + Hash, T> {
    flights: Arc<DashMap<K, Flight<T>>>,
    key: K,
}

impl<K: Eq + Hash, T> RecordGuard<K, T> {
    fn new(flights: Arc<DashMap<K, Flight<T>>>, key: K) -> Self {
        Self { flights, key }
    }
}

impl<K: Eq + Hash, T> Drop for RecordGuard<K, T> {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

struct WaiterGuard {
    count: Arc<AtomicUsize>,
}

impl WaiterGuard {
    fn attach(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self {
            count: Arc::clone(count),
        }
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
