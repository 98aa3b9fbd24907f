//! Optional observability helpers for the request-path guards.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `shortener_guard.guard` with the `guard` and `stage`
//!   (call site) fields, plus debug events from admission renewal tasks.
//! - Enable `metrics` to increment the `shortener_guard_decision_total` counter for every
//!   decision, labeled by `guard` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Guards observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardKind {
	/// Per-client admission control.
	Admission,
	/// Refresh-token exchange.
	Refresh,
	/// Refresh-token invalidation on logout.
	Logout,
}
impl GuardKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardKind::Admission => "admission",
			GuardKind::Refresh => "refresh",
			GuardKind::Logout => "logout",
		}
	}
}
impl Display for GuardKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardOutcome {
	/// Request admitted.
	Allowed,
	/// Request rejected by an ordinary denial.
	Denied,
	/// Refresh (or logout) completed.
	Granted,
	/// Refresh token replay detected and escalated.
	Replay,
	/// A dependency failed; the error went back to the caller.
	Failure,
}
impl GuardOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardOutcome::Allowed => "allowed",
			GuardOutcome::Denied => "denied",
			GuardOutcome::Granted => "granted",
			GuardOutcome::Replay => "replay",
			GuardOutcome::Failure => "failure",
		}
	}
}
impl Display for GuardOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
