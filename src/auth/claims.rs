//! Refresh-token claims decoded once by the token-verification layer and passed explicitly.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenId},
};

/// Monotonic account counter bumped on every credential change.
///
/// A refresh token embeds the version that was current when it was issued; any mismatch with
/// the account's current version revokes the token without enumerating it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountVersion(pub u64);
impl AccountVersion {
	/// Returns the version that follows a credential change.
	pub const fn next(self) -> Self {
		Self(self.0.saturating_add(1))
	}
}
impl Display for AccountVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "v{}", self.0)
	}
}

/// Verified claims of a refresh token (signature, issuer, and `type = "refresh"` already checked).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
	/// Token identifier (`jti`).
	pub token_id: TokenId,
	/// Owning account (`sub`).
	pub subject: AccountId,
	/// Account version embedded at issuance.
	pub version: AccountVersion,
	/// Absolute expiry (`exp`).
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl RefreshClaims {
	/// Bundles the decoded claim values.
	pub fn new(
		token_id: TokenId,
		subject: AccountId,
		version: AccountVersion,
		expires_at: OffsetDateTime,
	) -> Self {
		Self { token_id, subject, version, expires_at }
	}

	/// Remaining lifetime at `now`, or `None` once the token has expired.
	///
	/// Ledger records use this as their TTL so they never outlive the token they protect.
	pub fn remaining_ttl(&self, now: OffsetDateTime) -> Option<Duration> {
		let remaining = self.expires_at - now;

		remaining.is_positive().then_some(remaining)
	}
}
