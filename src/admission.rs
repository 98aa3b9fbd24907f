//! Per-client admission control under a fixed-window policy.
//!
//! Every client key owns a bounded permit pool. [`AdmissionController::admit`] takes one permit
//! without blocking and denies once the pool is empty. A lightweight renewal task per key,
//! started exactly once when the key is first seen, empties the pool every window, which
//! resets the quota without per-request timestamps.
//!
//! This is a fixed-window counter: a client can spend a full quota just before a window
//! boundary and another right after it. Memory per key is constant.
//!
//! Keys live in a sharded map and each key carries its own lock, so admission for one client
//! never waits on another. Entries are kept for the life of the controller; see
//! [`AdmissionController::tracked_keys`] for observing cardinality.

pub mod config;

mod metrics;
mod quota;

pub use config::AdmissionConfig;
pub use metrics::AdmissionMetrics;

// std
use std::{
	sync::Weak,
	time::Duration as StdDuration,
};
// crates.io
use dashmap::DashMap;
use tokio::{
	runtime::Handle,
	time::{self, Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ShutdownError},
	obs::{self, GuardKind, GuardOutcome, GuardSpan},
};
use quota::ClientQuota;

/// Decision returned by [`AdmissionController::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
	/// The request may proceed.
	Allowed,
	/// The client exhausted its quota for the current window (or the controller is shut down).
	Denied,
}
impl Admission {
	/// Returns `true` for [`Admission::Allowed`].
	pub const fn is_allowed(self) -> bool {
		matches!(self, Admission::Allowed)
	}
}

/// Cloneable handle to a shared admission controller.
///
/// Clones share one set of quotas, renewal tasks, and shutdown signal.
#[derive(Clone)]
pub struct AdmissionController {
	inner: Arc<ControllerState>,
}
impl AdmissionController {
	/// Builds a controller on the current Tokio runtime.
	pub fn new(config: &AdmissionConfig) -> Result<Self> {
		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;

		Self::with_runtime(config, runtime)
	}

	/// Builds a controller whose renewal tasks run on `runtime`.
	pub fn with_runtime(config: &AdmissionConfig, runtime: Handle) -> Result<Self> {
		let capacity = config.validate()?;

		Ok(Self {
			inner: Arc::new(ControllerState {
				quotas: DashMap::new(),
				capacity,
				window: config.window(),
				runtime,
				cancel: CancellationToken::new(),
				tracker: TaskTracker::new(),
				metrics: AdmissionMetrics::default(),
			}),
		})
	}

	/// Decides whether one more request from `key` may proceed.
	///
	/// Unseen keys get a fresh quota and their renewal task on first use. The decision itself
	/// is a single atomic update and never waits.
	pub fn admit(&self, key: &str) -> Admission {
		let state = &self.inner;
		let decision = if state.cancel.is_cancelled() {
			Admission::Denied
		} else {
			let quota = state.quota(key);

			quota.ensure_renewal(|weak| state.spawn_renewal(weak));

			if quota.try_acquire() { Admission::Allowed } else { Admission::Denied }
		};

		match decision {
			Admission::Allowed => {
				state.metrics.record_allowed();
				obs::record_decision(GuardKind::Admission, GuardOutcome::Allowed);
			},
			Admission::Denied => {
				state.metrics.record_denied();
				obs::record_decision(GuardKind::Admission, GuardOutcome::Denied);
			},
		}

		decision
	}

	/// Permits left for `key` in the current window, if the key has been seen.
	pub fn remaining(&self, key: &str) -> Option<u32> {
		self.inner.quotas.get(key).map(|quota| quota.remaining())
	}

	/// Number of distinct client keys tracked so far.
	pub fn tracked_keys(&self) -> usize {
		self.inner.quotas.len()
	}

	/// Shared decision counters.
	pub fn metrics(&self) -> &AdmissionMetrics {
		&self.inner.metrics
	}

	/// Returns `true` once [`shutdown`](Self::shutdown) has been requested.
	pub fn is_shut_down(&self) -> bool {
		self.inner.cancel.is_cancelled()
	}

	/// Stops every renewal task, waiting at most `wait` for them to exit.
	///
	/// Tasks still running at the deadline are aborted and their keys reported in
	/// [`ShutdownError::TimedOut`]. Calling this again after the first call returns `Ok(())`.
	/// Once shut down, [`admit`](Self::admit) denies every request.
	pub async fn shutdown(&self, wait: StdDuration) -> Result<(), ShutdownError> {
		let state = &self.inner;

		if state.cancel.is_cancelled() {
			return Ok(());
		}

		let span = GuardSpan::new(GuardKind::Admission, "shutdown");

		span.instrument(async move {
			state.cancel.cancel();
			state.tracker.close();

			if time::timeout(wait, state.tracker.wait()).await.is_ok() {
				return Ok(());
			}

			let mut pending = state
				.quotas
				.iter()
				.filter(|entry| entry.value().abort_renewal())
				.map(|entry| entry.key().clone())
				.collect::<Vec<_>>();

			if pending.is_empty() {
				return Ok(());
			}

			pending.sort();

			Err(ShutdownError::TimedOut { pending })
		})
		.await
	}
}
impl Debug for AdmissionController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionController")
			.field("capacity", &self.inner.capacity)
			.field("window", &self.inner.window)
			.field("tracked_keys", &self.inner.quotas.len())
			.field("shut_down", &self.inner.cancel.is_cancelled())
			.finish()
	}
}

struct ControllerState {
	quotas: DashMap<String, Arc<ClientQuota>>,
	capacity: u32,
	window: StdDuration,
	runtime: Handle,
	cancel: CancellationToken,
	tracker: TaskTracker,
	metrics: AdmissionMetrics,
}
impl ControllerState {
	fn quota(&self, key: &str) -> Arc<ClientQuota> {
		if let Some(quota) = self.quotas.get(key) {
			return quota.value().clone();
		}

		self.quotas
			.entry(key.to_owned())
			.or_insert_with(|| Arc::new(ClientQuota::new(key, self.capacity)))
			.value()
			.clone()
	}

	fn spawn_renewal(&self, quota: Weak<ClientQuota>) -> tokio::task::JoinHandle<()> {
		self.metrics.record_renewal_started();

		self.tracker.spawn_on(renew(quota, self.window, self.cancel.clone()), &self.runtime)
	}
}

/// Empties the quota every `window` until cancelled or the quota is dropped.
async fn renew(quota: Weak<ClientQuota>, window: StdDuration, cancel: CancellationToken) {
	let Some(key) = quota.upgrade().map(|quota| Arc::<str>::from(quota.key())) else {
		return;
	};
	let mut ticker = time::interval_at(Instant::now() + window, window);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	obs::renewal_event(&key, "started");

	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = ticker.tick() => match quota.upgrade() {
				Some(quota) => quota.drain(),
				None => break,
			},
		}
	}

	obs::renewal_event(&key, "stopped");
}
