//! Single-flight request coalescing.
//!
//! At most one operation runs per key. Callers that arrive while it is in
//! flight await the same shared future and all observe the same outcome.
//! The operation is spawned onto the runtime, so it finishes (and its side
//! effects land) even when every waiter has gone away. The map entry is
//! removed by a guard owned by the spawned task once the operation settles,
//! before any waiter observes the result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{CoreError, CoreResult};

/// A cloneable handle on an in-flight operation's outcome.
pub type FlightHandle<T> = Shared<BoxFuture<'static, CoreResult<T>>>;

struct Flight<T> {
    generation: u64,
    future: FlightHandle<T>,
}

type FlightMap<T> = Mutex<HashMap<String, Flight<T>>>;

pub struct SingleFlight<T> {
    flights: Arc<FlightMap<T>>,
    next_generation: AtomicU64,
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` for `key`, or joins the run already in flight.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> CoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
    {
        self.start(key, operation).await
    }

    /// Registers (or joins) the flight for `key` without waiting on it.
    ///
    /// The returned handle may be dropped; the operation keeps running.
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, key: &str, operation: F) -> FlightHandle<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel::<CoreResult<T>>();
        let (generation, future) = {
            let mut flights = self.flights.lock();
            if let Some(existing) = flights.get(key) {
                tracing::debug!("joining in-flight operation key={key}");
                return existing.future.clone();
            }
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let future = async move {
                match receiver.await {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::Internal(
                        "coalesced operation ended without a result".to_string(),
                    )),
                }
            }
            .boxed()
            .shared();
            flights.insert(
                key.to_string(),
                Flight {
                    generation,
                    future: future.clone(),
                },
            );
            (generation, future)
        };

        // The lock is released from here on: if building or spawning the
        // operation unwinds, the guard clears the entry and waiters see an
        // internal error.
        let guard = FlightGuard {
            flights: Arc::downgrade(&self.flights),
            key: key.to_string(),
            generation,
        };
        let work = operation();
        tokio::spawn(async move {
            let result = work.await;
            drop(guard);
            let _ = sender.send(result);
        });
        future
    }

    /// Detaches the flight for `key`: later callers start a fresh run while
    /// the detached one still settles for its existing waiters.
    pub fn forget(&self, key: &str) -> bool {
        self.flights.lock().remove(key).is_some()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights.lock().contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

/// Clears a flight's map entry when its task finishes, panics included.
struct FlightGuard<T> {
    flights: Weak<FlightMap<T>>,
    key: String,
    generation: u64,
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        let Some(flights) = self.flights.upgrade() else {
            return;
        };
        let mut flights = flights.lock();
        if flights
            .get(&self.key)
            .is_some_and(|flight| flight.generation == self.generation)
        {
            flights.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let flight = SingleFlight::<u64>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = || {
            let runs = runs.clone();
            flight.run("key", move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(42)
            })
        };
        let results = futures_util::future::join_all((0..8).map(|_| call())).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|result| result == &Ok(42)));
        assert!(!flight.is_in_flight("key"));
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_clears_entry() {
        let flight = SingleFlight::<u64>::new();
        let fail = || {
            flight.run("key", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(CoreError::Io("boom".to_string()))
            })
        };
        let (a, b) = tokio::join!(fail(), fail());
        assert_eq!(a, Err(CoreError::Io("boom".to_string())));
        assert_eq!(a, b);
        assert_eq!(flight.in_flight(), 0);

        let next = flight.run("key", || async { Ok(7) }).await;
        assert_eq!(next, Ok(7));
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flight = SingleFlight::<&'static str>::new();
        let (a, b) = tokio::join!(
            flight.run("a", || async { Ok("a") }),
            flight.run("b", || async { Ok("b") }),
        );
        assert_eq!((a, b), (Ok("a"), Ok("b")));
    }

    #[tokio::test]
    async fn panicking_setup_releases_the_key() {
        let flight = SingleFlight::<u64>::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            flight.start("key", || -> std::future::Ready<CoreResult<u64>> {
                panic!("operation could not be built")
            })
        }));
        assert!(outcome.is_err());
        assert!(!flight.is_in_flight("key"));

        let next = flight.run("key", || async { Ok(3) }).await;
        assert_eq!(next, Ok(3));
    }

    #[test]
    fn start_outside_runtime_panics_instead_of_hanging() {
        let flight = SingleFlight::<u64>::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            flight.start("key", || async { Ok(1) })
        }));
        assert!(outcome.is_err());
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_operation_fails_waiters() {
        let flight = SingleFlight::<u64>::new();
        async fn explode() -> CoreResult<u64> {
            tokio::task::yield_now().await;
            panic!("operation blew up")
        }
        let result = flight.run("key", explode).await;
        assert!(matches!(result, Err(CoreError::Internal(_))));
        assert!(!flight.is_in_flight("key"));
    }

    #[tokio::test]
    async fn forgotten_flight_is_not_joined() {
        let flight = SingleFlight::<u64>::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let op = |value: u64| {
            let runs = runs.clone();
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(value)
            }
        };

        let old = flight.start("key", op(1));
        assert!(flight.forget("key"));
        let new = flight.start("key", op(2));

        assert_eq!(old.await, Ok(1));
        assert_eq!(new.await, Ok(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!flight.is_in_flight("key"));
    }

    #[tokio::test]
    async fn abandoned_run_still_completes() {
        let flight = SingleFlight::<u64>::new();
        let done = Arc::new(AtomicUsize::new(0));
        let done_in_task = done.clone();

        let waited = tokio::time::timeout(
            Duration::from_millis(10),
            flight.run("slow", move || async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                done_in_task.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }),
        )
        .await;
        assert!(waited.is_err());
        assert!(flight.is_in_flight("slow"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight("slow"));
    }
}
