//! Cached provider key set with singleflight refreshes.

// self
use crate::{_prelude::*, jose::KeySet};

/// Holds the most recently fetched JWK set.
///
/// Readers never block on the network. Refreshes are serialized through an async lock, and a
/// caller that waited behind another refresh reuses its result instead of fetching again.
/// Whether an unknown `kid` warrants a refresh is left to the caller.
#[derive(Debug, Default)]
pub struct KeySetCache {
	state: RwLock<CachedKeySet>,
	refresh_guard: AsyncMutex<()>,
}
impl KeySetCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Currently cached key set, if any.
	pub fn current(&self) -> Option<Arc<KeySet>> {
		self.state.read().keys.clone()
	}

	/// When the cached key set was stored.
	pub fn fetched_at(&self) -> Option<OffsetDateTime> {
		self.state.read().fetched_at
	}

	/// Seeds or replaces the cached key set without fetching.
	pub fn replace(&self, keys: KeySet) -> Arc<KeySet> {
		let keys = Arc::new(keys);

		self.state.write().store(keys.clone());

		keys
	}

	/// Drops the cached key set so the next lookup fetches.
	pub fn clear(&self) {
		self.state.write().keys = None;
	}

	/// Returns the cached key set, running `fetch` when empty or when `force` is set.
	pub(crate) async fn get_or_fetch<F, Fut>(&self, force: bool, fetch: F) -> Result<Arc<KeySet>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<KeySet>>,
	{
		let observed = {
			let state = self.state.read();

			if let (false, Some(keys)) = (force, &state.keys) {
				return Ok(keys.clone());
			}

			state.generation
		};
		let _guard = self.refresh_guard.lock().await;

		{
			let state = self.state.read();

			if let (true, Some(keys)) = (state.generation != observed, &state.keys) {
				return Ok(keys.clone());
			}
		}

		let keys = Arc::new(fetch().await?);

		self.state.write().store(keys.clone());

		Ok(keys)
	}
}

#[derive(Debug, Default)]
struct CachedKeySet {
	keys: Option<Arc<KeySet>>,
	generation: u64,
	fetched_at: Option<OffsetDateTime>,
}
impl CachedKeySet {
	fn store(&mut self, keys: Arc<KeySet>) {
		self.keys = Some(keys);
		self.generation += 1;
		self.fetched_at = Some(OffsetDateTime::now_utc());
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use tokio::time::{self, Duration as TokioDuration};
	// self
	use super::*;
	use crate::{_preludet::*, error::InvalidResponseError};

	async fn counted_fetch(calls: &AtomicUsize) -> Result<KeySet> {
		calls.fetch_add(1, Ordering::SeqCst);
		time::sleep(TokioDuration::from_millis(20)).await;

		Ok(key_set_fixture())
	}

	#[tokio::test]
	async fn cached_key_sets_are_reused() {
		let cache = KeySetCache::new();
		let calls = AtomicUsize::new(0);
		let first = cache
			.get_or_fetch(false, || counted_fetch(&calls))
			.await
			.expect("First fetch should succeed.");
		let second = cache
			.get_or_fetch(false, || counted_fetch(&calls))
			.await
			.expect("Cached lookup should succeed.");

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(cache.fetched_at().is_some());
	}

	#[tokio::test]
	async fn concurrent_forced_refreshes_fetch_once() {
		let cache = KeySetCache::new();
		let calls = AtomicUsize::new(0);
		let (a, b, c) = tokio::join!(
			cache.get_or_fetch(true, || counted_fetch(&calls)),
			cache.get_or_fetch(true, || counted_fetch(&calls)),
			cache.get_or_fetch(true, || counted_fetch(&calls)),
		);
		let a = a.expect("Refresh should succeed.");

		assert!(Arc::ptr_eq(&a, &b.expect("Refresh should succeed.")));
		assert!(Arc::ptr_eq(&a, &c.expect("Refresh should succeed.")));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_fetches_leave_the_cache_untouched() {
		let cache = KeySetCache::new();
		let seeded = cache.replace(key_set_fixture());
		let err = cache
			.get_or_fetch(true, || async {
				Err::<KeySet, Error>(InvalidResponseError::MissingIdToken.into())
			})
			.await
			.expect_err("Fetch failure must propagate.");

		assert!(matches!(err, Error::InvalidResponse(_)));
		assert!(Arc::ptr_eq(&seeded, &cache.current().expect("Seeded keys should remain.")));

		cache.clear();

		assert!(cache.current().is_none());
	}
}
