// self
use crate::{_prelude::*, obs::GuardKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedGuard<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedGuard<F> = F;

/// A span builder used by guard entry points.
#[derive(Clone, Debug)]
pub struct GuardSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GuardSpan {
	/// Creates a new span tagged with the provided guard kind + stage.
	pub fn new(kind: GuardKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("shortener_guard.guard", guard = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedGuard<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event from an admission renewal task (when tracing is enabled).
pub(crate) fn renewal_event(key: &str, event: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target: "shortener_guard.admission", key, event, "renewal task");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (key, event);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn renewal_events_are_safe_without_subscriber() {
		renewal_event("127.0.0.1", "started");
		renewal_event("127.0.0.1", "stopped");
	}

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = GuardSpan::new(GuardKind::Refresh, "instrument_passes_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
