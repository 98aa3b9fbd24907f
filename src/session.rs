//! Refresh and logout orchestration on top of the refresh ledger.
//!
//! [`SessionGate::begin_refresh`] runs every check a refresh handler needs once the signed
//! token has been verified: expiry, blacklist, replay, account existence, account lock, and
//! account version. A token that passes every check is claimed with one atomic increment, so
//! of two concurrent presentations only the one moving the count from one to two is granted.
//! Replay is escalated here rather than reported: the owning account is locked and the token
//! id blacklisted before the denial is returned. Callers mint the new token pair only on
//! [`RefreshDecision::Granted`]; the presented token is already consumed at that point.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	account::AccountDirectory,
	auth::RefreshClaims,
	ledger::{BlacklistStatus, MarkOutcome, RefreshLedger, UseCount},
	obs::{self, GuardKind, GuardOutcome, GuardSpan},
	store::ExpiringStore,
};

/// Why a refresh was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenialReason {
	/// The token's lifetime has already ended.
	Expired,
	/// The token id was invalidated by logout or an earlier replay.
	Blacklisted,
	/// The token was presented again after its single use; the account has been locked.
	Replay,
	/// The subject no longer exists.
	UnknownAccount,
	/// The subject is locked.
	AccountLocked,
	/// The subject's credentials changed after the token was issued.
	StaleVersion,
}
impl DenialReason {
	/// Returns a stable label for logs and responses.
	pub const fn as_str(self) -> &'static str {
		match self {
			DenialReason::Expired => "expired",
			DenialReason::Blacklisted => "blacklisted",
			DenialReason::Replay => "replay",
			DenialReason::UnknownAccount => "unknown_account",
			DenialReason::AccountLocked => "account_locked",
			DenialReason::StaleVersion => "stale_version",
		}
	}
}
impl Display for DenialReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of [`SessionGate::begin_refresh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshDecision {
	/// The token was consumed; mint a new token pair.
	Granted,
	/// Reject the refresh.
	Denied(DenialReason),
}
impl RefreshDecision {
	/// Returns `true` for [`RefreshDecision::Granted`].
	pub const fn is_granted(self) -> bool {
		matches!(self, RefreshDecision::Granted)
	}
}

/// Refresh/logout gate combining the ledger with the account directory.
pub struct SessionGate<S, A>
where
	S: ?Sized + ExpiringStore,
	A: ?Sized + AccountDirectory,
{
	ledger: RefreshLedger<S>,
	accounts: Arc<A>,
	metrics: Arc<RefreshMetrics>,
}
impl<S, A> SessionGate<S, A>
where
	S: ?Sized + ExpiringStore,
	A: ?Sized + AccountDirectory,
{
	/// Creates a gate over `ledger` and `accounts`.
	pub fn new(ledger: RefreshLedger<S>, accounts: Arc<A>) -> Self {
		Self { ledger, accounts, metrics: Default::default() }
	}

	/// Underlying ledger.
	pub fn ledger(&self) -> &RefreshLedger<S> {
		&self.ledger
	}

	/// Account directory used for version checks and replay escalation.
	pub fn accounts(&self) -> &Arc<A> {
		&self.accounts
	}

	/// Refresh counters shared by clones of this gate.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Decides whether the verified refresh token described by `claims` may be exchanged.
	///
	/// Store and directory failures are returned as errors so the caller can choose between
	/// failing open and failing closed. A replay locks `claims.subject` before returning
	/// [`DenialReason::Replay`].
	pub async fn begin_refresh(&self, claims: &RefreshClaims) -> Result<RefreshDecision> {
		const KIND: GuardKind = GuardKind::Refresh;

		let span = GuardSpan::new(KIND, "begin_refresh");

		self.metrics.record_attempt();

		let result = span.instrument(self.evaluate(claims, OffsetDateTime::now_utc())).await;

		match &result {
			Ok(RefreshDecision::Granted) => {
				self.metrics.record_granted();
				obs::record_decision(KIND, GuardOutcome::Granted);
			},
			Ok(RefreshDecision::Denied(DenialReason::Replay)) => {
				self.metrics.record_replay();
				obs::record_decision(KIND, GuardOutcome::Replay);
			},
			Ok(RefreshDecision::Denied(_)) => {
				self.metrics.record_denied();
				obs::record_decision(KIND, GuardOutcome::Denied);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_decision(KIND, GuardOutcome::Failure);
			},
		}

		result
	}

	/// Blacklists the token for the rest of its lifetime.
	///
	/// An already expired token needs no record and succeeds without touching the store.
	pub async fn logout(&self, claims: &RefreshClaims) -> Result<()> {
		const KIND: GuardKind = GuardKind::Logout;

		let span = GuardSpan::new(KIND, "logout");
		let result = span
			.instrument(async move {
				match claims.remaining_ttl(OffsetDateTime::now_utc()) {
					Some(ttl) => self.ledger.invalidate(&claims.token_id, ttl).await,
					None => Ok(()),
				}
			})
			.await;

		match &result {
			Ok(()) => obs::record_decision(KIND, GuardOutcome::Granted),
			Err(_) => obs::record_decision(KIND, GuardOutcome::Failure),
		}

		result
	}

	async fn evaluate(
		&self,
		claims: &RefreshClaims,
		now: OffsetDateTime,
	) -> Result<RefreshDecision> {
		let Some(ttl) = claims.remaining_ttl(now) else {
			return Ok(RefreshDecision::Denied(DenialReason::Expired));
		};

		if self.ledger.check_blacklist(&claims.token_id).await? == BlacklistStatus::Blacklisted {
			return Ok(RefreshDecision::Denied(DenialReason::Blacklisted));
		}
		if let UseCount::TooManyUses { .. } =
			self.ledger.check_use_count(&claims.token_id, ttl).await?
		{
			return self.escalate_replay(claims, ttl).await;
		}

		let Some(current) = self.accounts.current_version(&claims.subject).await? else {
			return Ok(RefreshDecision::Denied(DenialReason::UnknownAccount));
		};

		if self.accounts.is_locked(&claims.subject).await? {
			return Ok(RefreshDecision::Denied(DenialReason::AccountLocked));
		}
		if current != claims.version {
			return Ok(RefreshDecision::Denied(DenialReason::StaleVersion));
		}

		// Only the presentation that moves the count from 1 to 2 owns the exchange.
		match self.ledger.mark_used(&claims.token_id).await? {
			MarkOutcome::Recorded { uses: 2 } => Ok(RefreshDecision::Granted),
			MarkOutcome::Recorded { .. } => self.escalate_replay(claims, ttl).await,
			MarkOutcome::Blacklisted => Ok(RefreshDecision::Denied(DenialReason::Blacklisted)),
		}
	}

	async fn escalate_replay(
		&self,
		claims: &RefreshClaims,
		ttl: Duration,
	) -> Result<RefreshDecision> {
		self.accounts.lock(&claims.subject).await?;
		self.ledger.invalidate(&claims.token_id, ttl).await?;

		Ok(RefreshDecision::Denied(DenialReason::Replay))
	}
}
impl<S, A> Clone for SessionGate<S, A>
where
	S: ?Sized + ExpiringStore,
	A: ?Sized + AccountDirectory,
{
	fn clone(&self) -> Self {
		Self {
			ledger: self.ledger.clone(),
			accounts: self.accounts.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<S, A> Debug for SessionGate<S, A>
where
	S: ?Sized + ExpiringStore,
	A: ?Sized + AccountDirectory,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionGate")
			.field("ledger", &self.ledger)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{AccountId, AccountVersion, TokenId},
		ledger::{BLACKLIST_FLOOR, TokenState},
	};

	fn account(id: &str) -> AccountId {
		AccountId::new(id).expect("Account fixture should be valid.")
	}

	#[tokio::test]
	async fn granted_refresh_consumes_token_and_replay_locks_once() {
		let (gate, store, accounts) = build_memory_test_gate();
		let claims = test_claims("abc", "acct-1", AccountVersion(1), Duration::hours(1));

		accounts.register(account("acct-1"), AccountVersion(1));

		assert_eq!(
			gate.begin_refresh(&claims).await.expect("First refresh should be evaluated."),
			RefreshDecision::Granted
		);
		assert_eq!(raw_ledger_value(&store, "abc").await, Some(2));
		assert_eq!(
			gate.begin_refresh(&claims).await.expect("Replay should be evaluated."),
			RefreshDecision::Denied(DenialReason::Replay)
		);
		assert_eq!(accounts.lock_requests(&account("acct-1")), 1);
		assert_eq!(
			gate.begin_refresh(&claims).await.expect("Blacklisted replay should be evaluated."),
			RefreshDecision::Denied(DenialReason::Blacklisted)
		);
		assert_eq!(accounts.lock_requests(&account("acct-1")), 1);
		assert!(raw_ledger_value(&store, "abc").await.is_some_and(|v| v >= BLACKLIST_FLOOR));

		let metrics = gate.metrics();

		assert_eq!(metrics.attempts(), 3);
		assert_eq!(metrics.granted(), 1);
		assert_eq!(metrics.replays(), 1);
		assert_eq!(metrics.denied(), 1);
		assert_eq!(metrics.failures(), 0);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn concurrent_presentations_grant_once_and_lock_once() {
		let (gate, _store, accounts) = build_memory_test_gate();

		for round in 0..50 {
			let owner = format!("acct-race-{round}");
			let claims =
				test_claims(&format!("race-{round}"), &owner, AccountVersion(1), Duration::hours(1));
			let barrier = Arc::new(tokio::sync::Barrier::new(2));

			accounts.register(account(&owner), AccountVersion(1));

			let spawn_presentation = || {
				let gate = gate.clone();
				let claims = claims.clone();
				let barrier = barrier.clone();

				tokio::spawn(async move {
					barrier.wait().await;

					gate.begin_refresh(&claims).await
				})
			};
			let first = spawn_presentation();
			let second = spawn_presentation();
			let decisions = [
				first.await.expect("Presentation task should not panic."),
				second.await.expect("Presentation task should not panic."),
			]
			.map(|decision| decision.expect("Presentation should be evaluated."));

			assert_eq!(
				decisions.iter().filter(|decision| decision.is_granted()).count(),
				1,
				"Exactly one of two racing presentations may be granted in round {round}."
			);
			assert!(decisions.contains(&RefreshDecision::Denied(DenialReason::Replay)));
			assert_eq!(accounts.lock_requests(&account(&owner)), 1);
		}
	}

	#[tokio::test]
	async fn expired_tokens_never_touch_the_store() {
		let (gate, store, accounts) = build_memory_test_gate();
		let claims = test_claims("old", "acct-1", AccountVersion(1), Duration::seconds(-5));

		accounts.register(account("acct-1"), AccountVersion(1));

		assert_eq!(
			gate.begin_refresh(&claims).await.expect("Expired token should be evaluated."),
			RefreshDecision::Denied(DenialReason::Expired)
		);
		gate.logout(&claims).await.expect("Logout of an expired token is a no-op.");
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn account_checks_follow_replay_checks() {
		let (gate, _store, accounts) = build_memory_test_gate();
		let ghost = test_claims("t-ghost", "ghost", AccountVersion(1), Duration::hours(1));

		assert_eq!(
			gate.begin_refresh(&ghost).await.expect("Unknown account should be evaluated."),
			RefreshDecision::Denied(DenialReason::UnknownAccount)
		);

		accounts.register(account("acct-2"), AccountVersion(1));

		let stale = test_claims("t-stale", "acct-2", AccountVersion(1), Duration::hours(1));

		accounts.bump_version(&account("acct-2"));

		assert_eq!(
			gate.begin_refresh(&stale).await.expect("Stale token should be evaluated."),
			RefreshDecision::Denied(DenialReason::StaleVersion)
		);

		accounts
			.lock(&account("acct-2"))
			.await
			.expect("Locking a registered account should succeed.");

		let fresh = test_claims("t-fresh", "acct-2", AccountVersion(2), Duration::hours(1));

		assert_eq!(
			gate.begin_refresh(&fresh).await.expect("Locked account should be evaluated."),
			RefreshDecision::Denied(DenialReason::AccountLocked)
		);
	}

	#[tokio::test]
	async fn logout_blacklists_for_remaining_lifetime() {
		let (gate, _store, accounts) = build_memory_test_gate();
		let claims = test_claims("t-out", "acct-3", AccountVersion(1), Duration::hours(1));
		let token = TokenId::new("t-out").expect("Token fixture should be valid.");

		accounts.register(account("acct-3"), AccountVersion(1));
		gate.logout(&claims).await.expect("Logout should succeed.");
		gate.logout(&claims).await.expect("Repeated logout should succeed.");

		assert_eq!(
			gate.ledger().state(&token).await.expect("State lookup should succeed."),
			TokenState::Blacklisted
		);
		assert_eq!(
			gate.begin_refresh(&claims).await.expect("Logged-out token should be evaluated."),
			RefreshDecision::Denied(DenialReason::Blacklisted)
		);
		assert_eq!(accounts.lock_requests(&account("acct-3")), 0);
	}

	#[test]
	fn denial_labels_are_stable() {
		assert_eq!(DenialReason::StaleVersion.to_string(), "stale_version");
		assert!(RefreshDecision::Granted.is_granted());
		assert!(!RefreshDecision::Denied(DenialReason::Replay).is_granted());
	}
}
