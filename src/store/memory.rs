//! Thread-safe in-memory [`ExpiringStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{ExpiringStore, StoreEntry, StoreError, StoreFuture, ensure_positive_ttl},
};

type EntryMap = Arc<RwLock<HashMap<String, StoreEntry>>>;

/// Thread-safe storage backend that keeps counters in-process for tests and demos.
///
/// Expired entries are invisible to reads and replaced by writes; call
/// [`purge_expired`](Self::purge_expired) to reclaim their memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(EntryMap);
impl MemoryStore {
	/// Number of entries currently held, including expired ones not yet purged.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no entries are held.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every entry whose expiry has passed.
	pub fn purge_expired(&self) {
		let now = OffsetDateTime::now_utc();

		self.0.write().retain(|_, entry| entry.is_live_at(now));
	}

	fn fetch_now(map: &EntryMap, key: &str) -> Option<i64> {
		let now = OffsetDateTime::now_utc();

		map.read().get(key).filter(|entry| entry.is_live_at(now)).map(|entry| entry.value)
	}

	fn insert_now(map: &EntryMap, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
		ensure_positive_ttl(key, ttl)?;

		let entry = StoreEntry::new(value, OffsetDateTime::now_utc(), ttl);

		map.write().insert(key.to_owned(), entry);

		Ok(())
	}

	fn insert_if_absent_now(
		map: &EntryMap,
		key: &str,
		value: i64,
		ttl: Duration,
	) -> Result<bool, StoreError> {
		ensure_positive_ttl(key, ttl)?;

		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| entry.is_live_at(now)) {
			return Ok(false);
		}

		guard.insert(key.to_owned(), StoreEntry::new(value, now, ttl));

		Ok(true)
	}

	fn increment_now(map: &EntryMap, key: &str) -> Result<Option<i64>, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		match guard.get_mut(key) {
			Some(entry) if entry.is_live_at(now) => {
				entry.value = entry.value.checked_add(1).ok_or_else(|| {
					StoreError::MalformedValue {
						key: key.to_owned(),
						message: "counter overflow".into(),
					}
				})?;

				Ok(Some(entry.value))
			},
			_ => Ok(None),
		}
	}
}
impl ExpiringStore for MemoryStore {
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>> {
		Box::pin(async move { Ok(Self::fetch_now(&self.0, key)) })
	}

	fn insert<'a>(&'a self, key: &'a str, value: i64, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::insert_now(&self.0, key, value, ttl) })
	}

	fn insert_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: i64,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { Self::insert_if_absent_now(&self.0, key, value, ttl) })
	}

	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>> {
		Box::pin(async move { Self::increment_now(&self.0, key) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn expired_entries_are_invisible_and_purgeable() {
		let store = MemoryStore::default();

		store
			.insert("refresh:short", 1, Duration::milliseconds(20))
			.await
			.expect("Insert with positive TTL should succeed.");
		store
			.insert("refresh:long", 1, Duration::minutes(5))
			.await
			.expect("Insert with positive TTL should succeed.");

		tokio::time::sleep(std::time::Duration::from_millis(40)).await;

		assert_eq!(store.fetch("refresh:short").await, Ok(None));
		assert_eq!(store.increment("refresh:short").await, Ok(None));
		assert_eq!(store.fetch("refresh:long").await, Ok(Some(1)));
		assert_eq!(store.len(), 2);

		store.purge_expired();

		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn insert_if_absent_replaces_expired_entries() {
		let store = MemoryStore::default();

		assert_eq!(store.insert_if_absent("k", 1, Duration::milliseconds(10)).await, Ok(true));
		assert_eq!(store.insert_if_absent("k", 5, Duration::minutes(1)).await, Ok(false));

		tokio::time::sleep(std::time::Duration::from_millis(30)).await;

		assert_eq!(store.insert_if_absent("k", 5, Duration::minutes(1)).await, Ok(true));
		assert_eq!(store.fetch("k").await, Ok(Some(5)));
	}

	#[tokio::test]
	async fn increment_overflow_is_reported() {
		let store = MemoryStore::default();

		store.insert("k", i64::MAX, Duration::minutes(1)).await.expect("Insert should succeed.");

		assert!(matches!(
			store.increment("k").await,
			Err(StoreError::MalformedValue { ref key, .. }) if key == "k"
		));
	}
}
