//! Cache-first fetching with at most one request in flight per key.
//!
//! A lookup first consults the [`ResultCache`]. On a miss the fetcher runs
//! and its outcome, success or failure, is written back. Callers that miss
//! on a key whose fetch is already running wait for that fetch instead of
//! starting another one.
//!
//! Every key carries a generation that [`FetchCoordinator::invalidate`] and
//! [`FetchCoordinator::clear`] advance. A fetch only writes its result if the
//! generation it started under is still current, so a slow request issued
//! before a manual refresh can't overwrite the newer answer.

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::entry::{CacheEntry, CacheSource, CachedValue};
use super::key::CacheKey;
use super::store::ResultCache;

type SharedFetch<T> = Shared<BoxFuture<'static, CacheEntry<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
  epoch: u64,
  key: u64,
}

struct InFlight<T> {
  generation: Generation,
  fetch: SharedFetch<T>,
}

struct FlightState<T> {
  in_flight: HashMap<String, InFlight<T>>,
  key_generations: HashMap<String, u64>,
  epoch: u64,
}

impl<T> FlightState<T> {
  fn generation(&self, hash: &str) -> Generation {
    Generation {
      epoch: self.epoch,
      key: self.key_generations.get(hash).copied().unwrap_or(0),
    }
  }
}

struct Inner<T> {
  cache: ResultCache<T>,
  state: Mutex<FlightState<T>>,
}

impl<T: Clone> Inner<T> {
  fn state(&self) -> MutexGuard<'_, FlightState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Record the outcome of a fetch started under `generation`.
  fn settle(&self, hash: &str, generation: Generation, value: CachedValue<T>) -> CacheEntry<T> {
    let mut state = self.state();
    if state
      .in_flight
      .get(hash)
      .is_some_and(|running| running.generation == generation)
    {
      state.in_flight.remove(hash);
    }

    if state.generation(hash) == generation {
      self.cache.store(hash, value)
    } else {
      warn!(key = hash, "discarding result of a fetch that was invalidated");
      self.cache.stamp(value)
    }
  }
}

/// Result of [`FetchCoordinator::fetch`].
#[derive(Debug, Clone)]
pub struct Fetched<T> {
  pub entry: CacheEntry<T>,
  pub source: CacheSource,
}

/// Shared handle; clones refer to the same cache.
pub struct FetchCoordinator<T> {
  inner: Arc<Inner<T>>,
}

impl<T> Clone for FetchCoordinator<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T> FetchCoordinator<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new(ttl: Duration) -> Self {
    Self::from_cache(ResultCache::new(ttl))
  }

  pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
    Self::from_cache(ResultCache::with_clock(ttl, clock))
  }

  fn from_cache(cache: ResultCache<T>) -> Self {
    Self {
      inner: Arc::new(Inner {
        cache,
        state: Mutex::new(FlightState {
          in_flight: HashMap::new(),
          key_generations: HashMap::new(),
          epoch: 0,
        }),
      }),
    }
  }

  /// The underlying cache, for direct reads.
  pub fn cache(&self) -> &ResultCache<T> {
    &self.inner.cache
  }

  /// Return the live entry for `key`, or run `fetcher` and cache its outcome.
  ///
  /// `fetcher` is only called when this call ends up performing the fetch.
  pub async fn fetch<F, Fut, E>(&self, key: &CacheKey, fetcher: F) -> Fetched<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display,
  {
    let hash = key.cache_hash();

    if let Some(entry) = self.inner.cache.get(&hash) {
      debug!(key = %key.description(), error = entry.is_error(), "cache hit");
      return Fetched {
        entry,
        source: CacheSource::Cache,
      };
    }

    let (fetch, source) = {
      let mut state = self.inner.state();
      let running = state.in_flight.get(&hash).map(|running| running.fetch.clone());
      match running {
        Some(fetch) => {
          debug!(key = %key.description(), "joining in-flight fetch");
          (fetch, CacheSource::Joined)
        }
        None => {
          info!(key = %key.description(), "cache miss, fetching");
          let generation = state.generation(&hash);
          let inner = Arc::clone(&self.inner);
          let settle_hash = hash.clone();
          let request = fetcher();
          let fetch = async move {
            let value = CachedValue::from_result(request.await);
            inner.settle(&settle_hash, generation, value)
          }
          .boxed()
          .shared();
          state.in_flight.insert(
            hash.clone(),
            InFlight {
              generation,
              fetch: fetch.clone(),
            },
          );
          (fetch, CacheSource::Network)
        }
      }
    };

    Fetched {
      entry: fetch.await,
      source,
    }
  }

  /// Live entry for `key`, without fetching.
  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
    self.inner.cache.get(&key.cache_hash())
  }

  /// When `key` was last written, even if that entry has since expired.
  pub fn last_updated(&self, key: &CacheKey) -> Option<chrono::DateTime<chrono::Utc>> {
    self.inner.cache.last_updated(&key.cache_hash())
  }

  /// Forget `key` so the next fetch goes to the network.
  ///
  /// A fetch already running for `key` is not aborted, but its result is
  /// no longer written to the cache.
  pub fn invalidate(&self, key: &CacheKey) {
    let hash = key.cache_hash();
    let mut state = self.inner.state();
    *state.key_generations.entry(hash.clone()).or_insert(0) += 1;
    state.in_flight.remove(&hash);
    self.inner.cache.delete(&hash);
    debug!(key = %key.description(), "invalidated");
  }

  /// Forget every key.
  pub fn clear(&self) {
    let mut state = self.inner.state();
    state.epoch += 1;
    state.in_flight.clear();
    self.inner.cache.clear();
    info!("result cache cleared");
  }

  /// Number of fetches currently running.
  pub fn in_flight(&self) -> usize {
    self.inner.state().in_flight.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use chrono::Utc;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  fn coordinator() -> (FetchCoordinator<u32>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    (
      FetchCoordinator::with_clock(Duration::minutes(15), clock.clone()),
      clock,
    )
  }

  fn key() -> CacheKey {
    CacheKey::search("work", "project = X", 5)
  }

  #[tokio::test]
  async fn test_second_fetch_within_ttl_hits_cache() {
    let (coordinator, _clock) = coordinator();
    let calls = Arc::new(AtomicUsize::new(0));

    for expected in [CacheSource::Network, CacheSource::Cache] {
      let calls = calls.clone();
      let fetched = coordinator
        .fetch(&key(), move || async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, String>(7)
        })
        .await;
      assert_eq!(fetched.source, expected);
      assert_eq!(fetched.entry.data(), Some(&7));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_errors_are_cached() {
    let (coordinator, clock) = coordinator();

    let first = coordinator
      .fetch(&key(), || async { Err::<u32, _>("boom") })
      .await;
    assert_eq!(first.entry.error(), Some("boom"));

    let second = coordinator
      .fetch(&key(), || async { Ok::<u32, String>(1) })
      .await;
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.entry.error(), Some("boom"));

    clock.advance(Duration::minutes(16));
    let third = coordinator
      .fetch(&key(), || async { Ok::<u32, String>(1) })
      .await;
    assert_eq!(third.source, CacheSource::Network);
    assert_eq!(third.entry.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_concurrent_misses_share_one_fetch() {
    let (coordinator, _clock) = coordinator();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel::<()>();
    let key = key();

    let first = {
      let calls = calls.clone();
      coordinator.fetch(&key, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        let _ = gate.await;
        Ok::<_, String>(1)
      })
    };
    let second = {
      let calls = calls.clone();
      coordinator.fetch(&key, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(2)
      })
    };

    let (a, b, _) = tokio::join!(first, second, async {
      tokio::task::yield_now().await;
      let _ = release.send(());
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.entry.data(), Some(&1));
    assert_eq!(b.entry.data(), Some(&1));
    assert_eq!(a.source, CacheSource::Network);
    assert_eq!(b.source, CacheSource::Joined);
    assert_eq!(coordinator.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_invalidated_fetch_does_not_overwrite_newer_result() {
    let (coordinator, _clock) = coordinator();
    let (release, gate) = oneshot::channel::<()>();
    let key = key();

    let stale = coordinator.fetch(&key, move || async move {
      let _ = gate.await;
      Ok::<_, String>(1)
    });
    let refresh = async {
      tokio::task::yield_now().await;
      coordinator.invalidate(&key);
      let fresh = coordinator
        .fetch(&key, || async { Ok::<_, String>(2) })
        .await;
      let _ = release.send(());
      fresh
    };

    let (stale, fresh) = tokio::join!(stale, refresh);

    assert_eq!(stale.entry.data(), Some(&1));
    assert_eq!(fresh.entry.data(), Some(&2));
    assert_eq!(coordinator.get(&key).and_then(|e| e.data().copied()), Some(2));
  }

  #[tokio::test]
  async fn test_clear_discards_running_fetches() {
    let (coordinator, _clock) = coordinator();
    let (release, gate) = oneshot::channel::<()>();
    let key = key();

    let running = coordinator.fetch(&key, move || async move {
      let _ = gate.await;
      Ok::<_, String>(1)
    });
    let clear = async {
      tokio::task::yield_now().await;
      coordinator.clear();
      let _ = release.send(());
    };
    let (result, _) = tokio::join!(running, clear);

    assert_eq!(result.entry.data(), Some(&1));
    assert!(coordinator.get(&key).is_none());
  }

  #[tokio::test]
  async fn test_last_updated_reports_expired_entries() {
    let (coordinator, clock) = coordinator();
    let fetched = coordinator
      .fetch(&key(), || async { Ok::<_, String>(3) })
      .await;
    clock.advance(Duration::hours(2));

    assert!(coordinator.get(&key()).is_none());
    assert_eq!(coordinator.last_updated(&key()), Some(fetched.entry.stored_at));
  }
}
