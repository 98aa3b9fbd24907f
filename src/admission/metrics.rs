// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for admission decisions.
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
	allowed: AtomicU64,
	denied: AtomicU64,
	renewals_started: AtomicU64,
}
impl AdmissionMetrics {
	/// Returns the number of admitted requests.
	pub fn allowed(&self) -> u64 {
		self.allowed.load(Ordering::Relaxed)
	}

	/// Returns the number of denied requests.
	pub fn denied(&self) -> u64 {
		self.denied.load(Ordering::Relaxed)
	}

	/// Returns how many renewal tasks were started (one per distinct key).
	pub fn renewals_started(&self) -> u64 {
		self.renewals_started.load(Ordering::Relaxed)
	}

	pub(crate) fn record_allowed(&self) {
		self.allowed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_denied(&self) {
		self.denied.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal_started(&self) {
		self.renewals_started.fetch_add(1, Ordering::Relaxed);
	}
}
