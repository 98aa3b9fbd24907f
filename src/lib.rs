//! Request-path guards for a URL-shortening service: per-client admission control that never
//! serializes unrelated clients, and a refresh-token ledger that detects replay, enforces
//! single-use rotation, and honors account-version mass invalidation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod account;
pub mod admission;
pub mod auth;
pub mod error;
pub mod ledger;
pub mod obs;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		account::MemoryDirectory,
		auth::{AccountId, AccountVersion, RefreshClaims, TokenId},
		ledger::RefreshLedger,
		session::SessionGate,
		store::{ExpiringStore, MemoryStore},
	};

	/// Session gate wired to in-memory collaborators, as used across integration tests.
	pub type MemoryTestGate = SessionGate<MemoryStore, MemoryDirectory>;

	/// Builds refresh claims for the provided token id/subject pair expiring `ttl` from now.
	pub fn test_claims(
		token_id: &str,
		subject: &str,
		version: AccountVersion,
		ttl: Duration,
	) -> RefreshClaims {
		RefreshClaims::new(
			TokenId::new(token_id).expect("Failed to build token identifier fixture."),
			AccountId::new(subject).expect("Failed to build account identifier fixture."),
			version,
			OffsetDateTime::now_utc() + ttl,
		)
	}

	/// Constructs a [`SessionGate`] backed by an in-memory store and account directory, returning
	/// the backends so tests can inspect them.
	pub fn build_memory_test_gate() -> (MemoryTestGate, Arc<MemoryStore>, Arc<MemoryDirectory>) {
		let store = Arc::new(MemoryStore::default());
		let accounts = Arc::new(MemoryDirectory::default());
		let ledger = RefreshLedger::new(store.clone());
		let gate = SessionGate::new(ledger, accounts.clone());

		(gate, store, accounts)
	}

	/// Returns the raw stored value for the provided token id in the default namespace.
	pub async fn raw_ledger_value(store: &MemoryStore, token_id: &str) -> Option<i64> {
		store
			.fetch(&format!("refresh:{token_id}"))
			.await
			.expect("Memory store fetch should never fail.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(test)] use color_eyre as _;
