//! Expiring key/value contract the refresh ledger is built on, plus built-in backends.
//!
//! The contract mirrors what a Redis hash with per-field expiry offers: point reads, writes
//! with a TTL, a set-if-absent, and an atomic increment that preserves the existing expiry.
//! Backends must make each call atomic per key; no cross-key transactions are assumed.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by every [`ExpiringStore`] call.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for integer counters that expire on their own.
pub trait ExpiringStore
where
	Self: Send + Sync,
{
	/// Returns the live value stored under `key`, if any.
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>>;

	/// Stores `value` under `key`, replacing any previous value and expiry.
	fn insert<'a>(&'a self, key: &'a str, value: i64, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Stores `value` only when no live value exists; returns whether the write happened.
	fn insert_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: i64,
		ttl: Duration,
	) -> StoreFuture<'a, bool>;

	/// Atomically adds one to a live value, keeping its expiry; returns `None` when absent.
	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>>;
}

/// Error type produced by [`ExpiringStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (unreachable server, I/O error).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A stored value cannot be interpreted by the caller.
	#[error("Malformed value under `{key}`: {message}.")]
	MalformedValue {
		/// Key holding the malformed value.
		key: String,
		/// Human-readable error payload.
		message: String,
	},
	/// Writes require a strictly positive TTL.
	#[error("TTL for `{key}` must be positive.")]
	NonPositiveTtl {
		/// Key the write targeted.
		key: String,
	},
}

/// Value plus absolute expiry, shared by the built-in backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
	/// Stored counter value.
	pub value: i64,
	/// Instant after which the entry no longer exists.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl StoreEntry {
	/// Builds an entry that expires `ttl` after `now`.
	pub fn new(value: i64, now: OffsetDateTime, ttl: Duration) -> Self {
		Self { value, expires_at: now + ttl }
	}

	/// Returns `true` while the entry has not reached its expiry at `now`.
	pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}

pub(crate) fn ensure_positive_ttl(key: &str, ttl: Duration) -> Result<(), StoreError> {
	if ttl.is_positive() { Ok(()) } else { Err(StoreError::NonPositiveTtl { key: key.to_owned() }) }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn entry_liveness_is_exclusive_of_expiry() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let entry = StoreEntry::new(1, now, Duration::seconds(30));

		assert!(entry.is_live_at(now));
		assert!(entry.is_live_at(now + Duration::seconds(29)));
		assert!(!entry.is_live_at(now + Duration::seconds(30)));
	}

	#[test]
	fn non_positive_ttl_is_rejected() {
		assert!(ensure_positive_ttl("refresh:abc", Duration::seconds(1)).is_ok());
		assert_eq!(
			ensure_positive_ttl("refresh:abc", Duration::ZERO),
			Err(StoreError::NonPositiveTtl { key: "refresh:abc".into() })
		);
	}

	#[test]
	fn entry_serializes_expiry_as_rfc3339() {
		let entry = StoreEntry::new(2, macros::datetime!(2025-11-10 12:00 UTC), Duration::hours(1));
		let payload = serde_json::to_string(&entry).expect("Store entry should serialize to JSON.");

		assert_eq!(payload, r#"{"value":2,"expires_at":"2025-11-10T13:00:00Z"}"#);
	}
}
