//! Refresh-token use ledger: replay detection, single-use enforcement, and logout blacklisting.
//!
//! Each token id maps to one integer in an [`ExpiringStore`]:
//!
//! - absent: the id was never presented (`Unseen`);
//! - `1`: the id was presented once and may be exchanged (`FirstUse`);
//! - `2..BLACKLIST_FLOOR`: the id was already exchanged, so any further presentation is a
//!   replay (`Used`);
//! - `>= BLACKLIST_FLOOR`: the id was invalidated (`Blacklisted`).
//!
//! Blacklisting writes the floor value, and increments can only move a value upwards, so a
//! `mark_used` racing an `invalidate` can never make a blacklisted id usable again. Every record
//! carries the token's remaining lifetime as its TTL and disappears when the token would have
//! expired anyway.
//!
//! The ledger holds no in-process locks; per-key atomicity comes from the store.

// self
use crate::{
	_prelude::*,
	auth::TokenId,
	error::ConfigError,
	store::{ExpiringStore, StoreError},
};

/// Lowest stored value that marks a token id as blacklisted.
pub const BLACKLIST_FLOOR: i64 = 1 << 32;

/// Namespace the ledger keys token ids under unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "refresh";

/// Ledger settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
	/// Prefix prepended to every token id (`"{namespace}:{token_id}"`).
	pub namespace: String,
}
impl LedgerConfig {
	/// Rejects an empty namespace.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.namespace.trim().is_empty() { Err(ConfigError::EmptyNamespace) } else { Ok(()) }
	}
}
impl Default for LedgerConfig {
	fn default() -> Self {
		Self { namespace: DEFAULT_NAMESPACE.into() }
	}
}

/// Result of [`RefreshLedger::check_use_count`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UseCount {
	/// The id has been presented exactly once; the refresh may proceed.
	Fresh,
	/// The id was already exchanged (or blacklisted). Callers must treat this as replay.
	TooManyUses {
		/// Stored value at the time of the check.
		uses: i64,
	},
}

/// Result of [`RefreshLedger::check_blacklist`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlacklistStatus {
	/// No blacklist marker exists for the id.
	Clear,
	/// The id was explicitly invalidated.
	Blacklisted,
}

/// Result of [`RefreshLedger::mark_used`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
	/// The use count was incremented to `uses`.
	Recorded {
		/// Use count after the increment.
		uses: i64,
	},
	/// The id is blacklisted; the increment did not make it usable.
	Blacklisted,
}

/// Observable lifecycle state of a token id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No record exists (never presented, or the record expired).
	Unseen,
	/// Presented once, not yet exchanged.
	FirstUse,
	/// Exchanged `uses - 1` times.
	Used {
		/// Stored use count.
		uses: i64,
	},
	/// Explicitly invalidated.
	Blacklisted,
}

/// Tracks refresh-token use counts and blacklist markers in an expiring store.
pub struct RefreshLedger<S>
where
	S: ?Sized + ExpiringStore,
{
	store: Arc<S>,
	namespace: Arc<str>,
}
impl<S> RefreshLedger<S>
where
	S: ?Sized + ExpiringStore,
{
	/// Creates a ledger using the default `refresh` namespace.
	pub fn new(store: Arc<S>) -> Self {
		Self { store, namespace: Arc::from(DEFAULT_NAMESPACE) }
	}

	/// Creates a ledger with validated settings.
	pub fn with_config(store: Arc<S>, config: &LedgerConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self { store, namespace: Arc::from(config.namespace.as_str()) })
	}

	/// Backend the ledger reads and writes.
	pub fn store(&self) -> &Arc<S> {
		&self.store
	}

	/// Records the first presentation of `token_id` with a use count of one.
	///
	/// An existing record is left untouched so a replayed id cannot reset its own count.
	pub async fn record_first_use(&self, token_id: &TokenId, ttl: Duration) -> Result<()> {
		let key = self.key(token_id);

		self.store.insert_if_absent(&key, 1, ttl).await?;

		Ok(())
	}

	/// Checks whether `token_id` may still be exchanged.
	///
	/// An unseen id is recorded as a first use with `ttl`. A stored count above one means the
	/// token was already exchanged, which callers must escalate as replay.
	pub async fn check_use_count(&self, token_id: &TokenId, ttl: Duration) -> Result<UseCount> {
		let key = self.key(token_id);
		let stored = match self.store.fetch(&key).await? {
			Some(value) => value,
			None => {
				if self.store.insert_if_absent(&key, 1, ttl).await? {
					return Ok(UseCount::Fresh);
				}

				// Lost the race to a concurrent presentation; judge what it wrote.
				self.store.fetch(&key).await?.unwrap_or(1)
			},
		};

		let count = match Self::interpret(&key, stored)? {
			TokenState::Unseen | TokenState::FirstUse => UseCount::Fresh,
			TokenState::Used { uses } => UseCount::TooManyUses { uses },
			TokenState::Blacklisted => UseCount::TooManyUses { uses: stored },
		};

		Ok(count)
	}

	/// Increments the use count after a successful, legitimate refresh.
	pub async fn mark_used(&self, token_id: &TokenId) -> Result<MarkOutcome> {
		let key = self.key(token_id);
		let uses = self.store.increment(&key).await?.ok_or_else(|| StoreError::MalformedValue {
			key: key.clone(),
			message: "no use count recorded for this token".into(),
		})?;

		match Self::interpret(&key, uses)? {
			TokenState::Blacklisted => Ok(MarkOutcome::Blacklisted),
			_ => Ok(MarkOutcome::Recorded { uses }),
		}
	}

	/// Reports whether `token_id` was explicitly invalidated; absence means clear.
	pub async fn check_blacklist(&self, token_id: &TokenId) -> Result<BlacklistStatus> {
		let key = self.key(token_id);

		match self.store.fetch(&key).await? {
			Some(value) if value >= BLACKLIST_FLOOR => Ok(BlacklistStatus::Blacklisted),
			_ => Ok(BlacklistStatus::Clear),
		}
	}

	/// Blacklists `token_id` until `ttl` elapses. Repeating the call is harmless.
	pub async fn invalidate(&self, token_id: &TokenId, ttl: Duration) -> Result<()> {
		let key = self.key(token_id);

		self.store.insert(&key, BLACKLIST_FLOOR, ttl).await?;

		Ok(())
	}

	/// Reads the current lifecycle state of `token_id` without mutating it.
	pub async fn state(&self, token_id: &TokenId) -> Result<TokenState> {
		let key = self.key(token_id);

		match self.store.fetch(&key).await? {
			Some(value) => Ok(Self::interpret(&key, value)?),
			None => Ok(TokenState::Unseen),
		}
	}

	fn key(&self, token_id: &TokenId) -> String {
		format!("{}:{}", self.namespace, token_id)
	}

	fn interpret(key: &str, value: i64) -> Result<TokenState, StoreError> {
		match value {
			v if v >= BLACKLIST_FLOOR => Ok(TokenState::Blacklisted),
			1 => Ok(TokenState::FirstUse),
			v if v > 1 => Ok(TokenState::Used { uses: v }),
			v => Err(StoreError::MalformedValue {
				key: key.to_owned(),
				message: format!("use count {v} is not positive"),
			}),
		}
	}
}
impl<S> Clone for RefreshLedger<S>
where
	S: ?Sized + ExpiringStore,
{
	fn clone(&self) -> Self {
		Self { store: self.store.clone(), namespace: self.namespace.clone() }
	}
}
impl<S> Debug for RefreshLedger<S>
where
	S: ?Sized + ExpiringStore,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshLedger").field("namespace", &self.namespace).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn ledger() -> RefreshLedger<MemoryStore> {
		RefreshLedger::new(Arc::new(MemoryStore::default()))
	}

	fn token(id: &str) -> TokenId {
		TokenId::new(id).expect("Token fixture should be valid.")
	}

	#[tokio::test]
	async fn first_use_then_check_is_fresh() {
		let ledger = ledger();
		let id = token("abc");

		ledger.record_first_use(&id, Duration::hours(1)).await.expect("First use should record.");

		assert_eq!(ledger.check_use_count(&id, Duration::hours(1)).await.ok(), Some(UseCount::Fresh));
		assert_eq!(ledger.state(&id).await.ok(), Some(TokenState::FirstUse));
	}

	#[tokio::test]
	async fn check_after_mark_used_reports_replay() {
		let ledger = ledger();
		let id = token("abc");

		ledger.record_first_use(&id, Duration::hours(1)).await.expect("First use should record.");

		assert_eq!(ledger.mark_used(&id).await.ok(), Some(MarkOutcome::Recorded { uses: 2 }));
		assert_eq!(
			ledger.check_use_count(&id, Duration::hours(1)).await.ok(),
			Some(UseCount::TooManyUses { uses: 2 })
		);
	}

	#[tokio::test]
	async fn check_on_unseen_id_records_first_use() {
		let ledger = ledger();
		let id = token("unseen");

		assert_eq!(ledger.state(&id).await.ok(), Some(TokenState::Unseen));
		assert_eq!(ledger.check_use_count(&id, Duration::hours(1)).await.ok(), Some(UseCount::Fresh));
		assert_eq!(ledger.state(&id).await.ok(), Some(TokenState::FirstUse));
	}

	#[tokio::test]
	async fn record_first_use_does_not_reset_existing_count() {
		let ledger = ledger();
		let id = token("abc");

		ledger.record_first_use(&id, Duration::hours(1)).await.expect("First use should record.");
		ledger.mark_used(&id).await.expect("Mark used should succeed.");
		ledger.record_first_use(&id, Duration::hours(1)).await.expect("Repeat should succeed.");

		assert_eq!(ledger.state(&id).await.ok(), Some(TokenState::Used { uses: 2 }));
	}

	#[tokio::test]
	async fn invalidate_blacklists_and_is_idempotent() {
		let ledger = ledger();
		let id = token("logout");

		assert_eq!(ledger.check_blacklist(&id).await.ok(), Some(BlacklistStatus::Clear));

		ledger.invalidate(&id, Duration::hours(1)).await.expect("Invalidate should succeed.");
		ledger.invalidate(&id, Duration::hours(1)).await.expect("Second invalidate should succeed.");

		assert_eq!(ledger.check_blacklist(&id).await.ok(), Some(BlacklistStatus::Blacklisted));
	}

	#[tokio::test]
	async fn mark_used_cannot_unblacklist() {
		let ledger = ledger();
		let id = token("racy");

		ledger.record_first_use(&id, Duration::hours(1)).await.expect("First use should record.");
		ledger.invalidate(&id, Duration::hours(1)).await.expect("Invalidate should succeed.");

		assert_eq!(ledger.mark_used(&id).await.ok(), Some(MarkOutcome::Blacklisted));
		assert_eq!(ledger.check_blacklist(&id).await.ok(), Some(BlacklistStatus::Blacklisted));
		assert!(matches!(
			ledger.check_use_count(&id, Duration::hours(1)).await,
			Ok(UseCount::TooManyUses { .. })
		));
	}

	#[tokio::test]
	async fn mark_used_without_record_is_an_error() {
		let err = ledger().mark_used(&token("ghost")).await.expect_err("Missing record must error.");

		assert!(matches!(err, Error::Storage(StoreError::MalformedValue { .. })));
	}

	#[tokio::test]
	async fn malformed_counts_surface_as_errors() {
		let store = Arc::new(MemoryStore::default());
		let ledger = RefreshLedger::new(store.clone());

		store.insert("refresh:bad", 0, Duration::hours(1)).await.expect("Seed should succeed.");

		let err = ledger
			.check_use_count(&token("bad"), Duration::hours(1))
			.await
			.expect_err("Zero use count must not be treated as fresh.");

		assert!(matches!(err, Error::Storage(StoreError::MalformedValue { .. })));
	}

	#[tokio::test]
	async fn namespace_isolates_ledgers() {
		let store = Arc::new(MemoryStore::default());
		let refresh = RefreshLedger::new(store.clone());
		let other = RefreshLedger::with_config(store.clone(), &LedgerConfig {
			namespace: "admin-refresh".into(),
		})
		.expect("Non-empty namespace should be accepted.");
		let id = token("shared");

		refresh.invalidate(&id, Duration::hours(1)).await.expect("Invalidate should succeed.");

		assert_eq!(other.check_blacklist(&id).await.ok(), Some(BlacklistStatus::Clear));
		assert!(matches!(
			RefreshLedger::with_config(store, &LedgerConfig { namespace: " ".into() }),
			Err(Error::Config(ConfigError::EmptyNamespace))
		));
	}

	#[test]
	fn ledger_config_defaults_to_refresh_namespace() {
		let config: LedgerConfig =
			serde_json::from_str("{}").expect("Empty ledger config should use defaults.");

		assert_eq!(config.namespace, DEFAULT_NAMESPACE);
		assert!(serde_json::from_str::<LedgerConfig>(r#"{"prefix":"x"}"#).is_err());
	}
}
