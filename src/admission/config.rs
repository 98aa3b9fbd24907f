//! Admission policy settings shared by every client key.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Fixed-window policy: at most `capacity` requests per client per `window_ms` milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
	/// Permits per window. Zero denies every request; negative values are rejected.
	pub capacity: i64,
	/// Window length in milliseconds after which every client's quota is replenished.
	pub window_ms: u64,
}
impl AdmissionConfig {
	/// Creates a config from a capacity and window.
	pub fn new(capacity: i64, window: StdDuration) -> Self {
		Self { capacity, window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX) }
	}

	/// Parses a JSON payload, reporting the path of any offending field.
	pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(payload);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}

	/// Window duration.
	pub fn window(&self) -> StdDuration {
		StdDuration::from_millis(self.window_ms)
	}

	/// Validates the policy and returns the capacity as a permit count.
	pub fn validate(&self) -> Result<u32, ConfigError> {
		if self.capacity < 0 {
			return Err(ConfigError::NegativeCapacity { capacity: self.capacity });
		}
		if self.window_ms == 0 {
			return Err(ConfigError::ZeroWindow);
		}

		u32::try_from(self.capacity)
			.map_err(|_| ConfigError::CapacityOutOfRange { capacity: self.capacity })
	}
}
