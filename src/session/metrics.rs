// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh-token exchanges.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	granted: AtomicU64,
	denied: AtomicU64,
	replays: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that were granted.
	pub fn granted(&self) -> u64 {
		self.granted.load(Ordering::Relaxed)
	}

	/// Returns the number of ordinary denials (replays excluded).
	pub fn denied(&self) -> u64 {
		self.denied.load(Ordering::Relaxed)
	}

	/// Returns the number of detected replays.
	pub fn replays(&self) -> u64 {
		self.replays.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that failed on a dependency error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_granted(&self) {
		self.granted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_denied(&self) {
		self.denied.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay(&self) {
		self.replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
