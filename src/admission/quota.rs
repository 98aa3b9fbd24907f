//! Per-client permit pool and its renewal slot.

// std
use std::sync::{
	Weak,
	atomic::{AtomicBool, AtomicU32, Ordering},
};
// crates.io
use tokio::task::JoinHandle;
// self
use crate::_prelude::*;

/// Bounded permit pool for one client key.
///
/// `used` never exceeds `capacity`. The renewal handle is guarded by a per-key lock, so
/// unrelated keys never contend and at most one renewal task ever exists for a key.
pub(crate) struct ClientQuota {
	key: Arc<str>,
	capacity: u32,
	used: AtomicU32,
	renewing: AtomicBool,
	renewal: Mutex<Option<JoinHandle<()>>>,
}
impl ClientQuota {
	pub(crate) fn new(key: &str, capacity: u32) -> Self {
		Self {
			key: Arc::from(key),
			capacity,
			used: AtomicU32::new(0),
			renewing: AtomicBool::new(false),
			renewal: Mutex::new(None),
		}
	}

	pub(crate) fn key(&self) -> &str {
		&self.key
	}

	/// Takes one permit if any is free. Never blocks.
	pub(crate) fn try_acquire(&self) -> bool {
		self.used
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
				(used < self.capacity).then_some(used + 1)
			})
			.is_ok()
	}

	/// Releases every permit consumed in the current window.
	pub(crate) fn drain(&self) {
		self.used.store(0, Ordering::Release);
	}

	pub(crate) fn remaining(&self) -> u32 {
		self.capacity.saturating_sub(self.used.load(Ordering::Acquire))
	}

	/// Starts the renewal task through `start` unless one was already started.
	///
	/// Returns `true` only for the caller that actually started it.
	pub(crate) fn ensure_renewal<F>(self: &Arc<Self>, start: F) -> bool
	where
		F: FnOnce(Weak<Self>) -> JoinHandle<()>,
	{
		if self.renewing.load(Ordering::Acquire) {
			return false;
		}

		let mut slot = self.renewal.lock();

		if self.renewing.load(Ordering::Acquire) {
			return false;
		}

		*slot = Some(start(Arc::downgrade(self)));
		self.renewing.store(true, Ordering::Release);

		true
	}

	/// Aborts the renewal task if it is still running; returns whether it was.
	pub(crate) fn abort_renewal(&self) -> bool {
		match self.renewal.lock().as_ref() {
			Some(handle) if !handle.is_finished() => {
				handle.abort();

				true
			},
			_ => false,
		}
	}
}
impl Debug for ClientQuota {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientQuota")
			.field("key", &self.key)
			.field("capacity", &self.capacity)
			.field("used", &self.used.load(Ordering::Relaxed))
			.field("renewing", &self.renewing.load(Ordering::Relaxed))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn permits_are_bounded_and_drain_resets() {
		let quota = ClientQuota::new("10.0.0.1", 2);

		assert!(quota.try_acquire());
		assert!(quota.try_acquire());
		assert!(!quota.try_acquire());
		assert_eq!(quota.remaining(), 0);

		quota.drain();

		assert_eq!(quota.remaining(), 2);
		assert!(quota.try_acquire());
	}

	#[test]
	fn zero_capacity_denies_everything() {
		let quota = ClientQuota::new("10.0.0.1", 0);

		assert!(!quota.try_acquire());
		assert_eq!(quota.remaining(), 0);
	}

	#[tokio::test]
	async fn renewal_starts_once() {
		let quota = Arc::new(ClientQuota::new("10.0.0.1", 1));
		let first = quota.ensure_renewal(|_| tokio::spawn(async {}));
		let second = quota.ensure_renewal(|_| panic!("A second renewal task must never start."));

		assert!(first);
		assert!(!second);
	}
}
