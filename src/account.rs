//! Account collaborator contract consumed by the session gate, plus an in-memory directory.
//!
//! The gate needs three things from the account store: the version embedded in freshly issued
//! tokens, whether the account is locked, and a way to lock it when replay is detected.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountVersion},
};

/// Boxed future returned by [`AccountDirectory`] calls.
pub type AccountFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Account lookups and the replay-escalation lock.
pub trait AccountDirectory
where
	Self: Send + Sync,
{
	/// Returns the account's current version, or `None` when the account does not exist.
	fn current_version<'a>(
		&'a self,
		account: &'a AccountId,
	) -> AccountFuture<'a, Option<AccountVersion>>;

	/// Returns `true` when the account has been locked.
	fn is_locked<'a>(&'a self, account: &'a AccountId) -> AccountFuture<'a, bool>;

	/// Locks the account so neither refresh nor password login can continue using it.
	fn lock<'a>(&'a self, account: &'a AccountId) -> AccountFuture<'a, ()>;
}

/// Stored state for one account in [`MemoryDirectory`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
	/// Current credential version.
	pub version: AccountVersion,
	/// Whether the account is locked.
	pub locked: bool,
	/// Number of lock requests received.
	pub lock_requests: u64,
}

/// Thread-safe account directory kept in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(Arc<RwLock<HashMap<AccountId, AccountRecord>>>);
impl MemoryDirectory {
	/// Adds (or replaces) an unlocked account at `version`.
	pub fn register(&self, account: AccountId, version: AccountVersion) {
		self.0.write().insert(account, AccountRecord { version, ..Default::default() });
	}

	/// Applies a credential change: bumps the version and clears the lock.
	///
	/// Every refresh token carrying the previous version stops being accepted.
	pub fn bump_version(&self, account: &AccountId) -> Option<AccountVersion> {
		let mut guard = self.0.write();
		let record = guard.get_mut(account)?;

		record.version = record.version.next();
		record.locked = false;

		Some(record.version)
	}

	/// Returns a copy of the stored record.
	pub fn record(&self, account: &AccountId) -> Option<AccountRecord> {
		self.0.read().get(account).copied()
	}

	/// Number of times [`AccountDirectory::lock`] was invoked for `account`.
	pub fn lock_requests(&self, account: &AccountId) -> u64 {
		self.record(account).map_or(0, |record| record.lock_requests)
	}
}
impl AccountDirectory for MemoryDirectory {
	fn current_version<'a>(
		&'a self,
		account: &'a AccountId,
	) -> AccountFuture<'a, Option<AccountVersion>> {
		Box::pin(async move { Ok(self.0.read().get(account).map(|record| record.version)) })
	}

	fn is_locked<'a>(&'a self, account: &'a AccountId) -> AccountFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.read().get(account).is_some_and(|record| record.locked)) })
	}

	fn lock<'a>(&'a self, account: &'a AccountId) -> AccountFuture<'a, ()> {
		Box::pin(async move {
			match self.0.write().get_mut(account) {
				Some(record) => {
					record.locked = true;
					record.lock_requests += 1;

					Ok(())
				},
				None => Err(Error::Account { reason: format!("account {account} does not exist") }),
			}
		})
	}
}
