//! File-backed [`ExpiringStore`] so the refresh ledger survives process restarts on small
//! deployments without a Redis instance.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{ExpiringStore, StoreEntry, StoreError, StoreFuture, ensure_positive_ttl},
};

/// Persists ledger counters to a JSON file after each mutation.
///
/// Expired entries are dropped when the snapshot is loaded and whenever it is rewritten.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<Mutex<HashMap<String, StoreEntry>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading live entries.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let mut snapshot = Self::load_snapshot(&path)?;

		Self::retain_live(&mut snapshot, OffsetDateTime::now_utc());

		Ok(Self { path, inner: Arc::new(Mutex::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<String, StoreEntry>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn retain_live(entries: &mut HashMap<String, StoreEntry>, now: OffsetDateTime) {
		entries.retain(|_, entry| entry.is_live_at(now));
	}

	fn persist_locked(&self, contents: &HashMap<String, StoreEntry>) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec(contents).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize store snapshot: {e}"),
		})?;
		let tmp_path = self.path.with_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn write_entry(&self, key: &str, entry: StoreEntry, now: OffsetDateTime) -> Result<(), StoreError> {
		let mut guard = self.inner.lock();

		Self::retain_live(&mut guard, now);
		guard.insert(key.to_owned(), entry);

		self.persist_locked(&guard)
	}
}
impl ExpiringStore for FileStore {
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(self.inner.lock().get(key).filter(|entry| entry.is_live_at(now)).map(|e| e.value))
		})
	}

	fn insert<'a>(&'a self, key: &'a str, value: i64, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			ensure_positive_ttl(key, ttl)?;

			let now = OffsetDateTime::now_utc();

			self.write_entry(key, StoreEntry::new(value, now, ttl), now)
		})
	}

	fn insert_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: i64,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			ensure_positive_ttl(key, ttl)?;

			let now = OffsetDateTime::now_utc();
			let mut guard = self.inner.lock();

			if guard.get(key).is_some_and(|entry| entry.is_live_at(now)) {
				return Ok(false);
			}

			Self::retain_live(&mut guard, now);
			guard.insert(key.to_owned(), StoreEntry::new(value, now, ttl));
			self.persist_locked(&guard)?;

			Ok(true)
		})
	}

	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<i64>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut guard = self.inner.lock();
			let next = match guard.get_mut(key) {
				Some(entry) if entry.is_live_at(now) => {
					entry.value = entry.value.checked_add(1).ok_or_else(|| {
						StoreError::MalformedValue {
							key: key.to_owned(),
							message: "counter overflow".into(),
						}
					})?;

					entry.value
				},
				_ => return Ok(None),
			};

			self.persist_locked(&guard)?;

			Ok(Some(next))
		})
	}
}
