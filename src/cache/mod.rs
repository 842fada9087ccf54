//! Memory-resident result cache shared by every renderer.
//!
//! - [`ResultCache`] maps a key to the last fetch outcome with lazy TTL expiry
//! - [`FetchCoordinator`] puts a fetcher behind the cache and collapses
//!   concurrent misses for the same key into one request
//! - [`CacheKey`] derives stable keys from request parameters

mod clock;
mod coordinator;
mod entry;
mod key;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{FetchCoordinator, Fetched};
pub use entry::{CacheEntry, CacheSource, CachedValue};
pub use key::CacheKey;
pub use store::ResultCache;
