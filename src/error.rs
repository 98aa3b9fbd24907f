//! Guard-level error types shared across the admission controller, ledger, and session gate.
//!
//! Denials are not errors. Everything in this module signals either a misconfiguration or a
//! broken dependency, and callers decide whether to fail open or closed.

// self
use crate::_prelude::*;

/// Guard-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical guard error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Shutdown did not complete within the allotted wait.
	#[error(transparent)]
	Shutdown(#[from] ShutdownError),

	/// Account directory could not answer a lookup or apply a lock.
	#[error("Account directory failure: {reason}.")]
	Account {
		/// Directory-supplied reason string.
		reason: String,
	},
}

/// Configuration and validation failures raised at construction time.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Admission capacity must not be negative.
	#[error("Admission capacity must not be negative, got {capacity}.")]
	NegativeCapacity {
		/// Capacity value that was rejected.
		capacity: i64,
	},
	/// Admission capacity does not fit the permit counter.
	#[error("Admission capacity {capacity} exceeds the supported range.")]
	CapacityOutOfRange {
		/// Capacity value that was rejected.
		capacity: i64,
	},
	/// Admission window must be positive.
	#[error("Admission window must be positive.")]
	ZeroWindow,
	/// The admission controller was constructed outside a Tokio runtime.
	#[error("Admission controller requires a Tokio runtime.")]
	MissingRuntime,
	/// Ledger namespace cannot be empty.
	#[error("Ledger namespace cannot be empty.")]
	EmptyNamespace,
	/// Configuration payload could not be parsed.
	#[error("Configuration payload is malformed.")]
	Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Failures reported when stopping background work.
#[derive(Debug, ThisError)]
pub enum ShutdownError {
	/// Some renewal tasks did not observe cancellation in time and were aborted.
	#[error("{} renewal task(s) did not stop before the shutdown deadline.", .pending.len())]
	TimedOut {
		/// Client keys whose renewal tasks were still running at the deadline.
		pending: Vec<String>,
	},
}
impl ShutdownError {
	/// Returns the client keys whose renewal tasks were abandoned.
	pub fn pending(&self) -> &[String] {
		match self {
			Self::TimedOut { pending } => pending,
		}
	}
}
