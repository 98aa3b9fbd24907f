// self
use crate::obs::{GuardKind, GuardOutcome};

/// Records a guard decision via the global metrics recorder (when enabled).
pub fn record_decision(kind: GuardKind, outcome: GuardOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"shortener_guard_decision_total",
			"guard" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_decision_noop_without_metrics() {
		record_decision(GuardKind::Refresh, GuardOutcome::Replay);
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(GuardKind::Admission.to_string(), "admission");
		assert_eq!(GuardOutcome::Failure.to_string(), "failure");
	}
}
