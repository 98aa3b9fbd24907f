//! Walks a client through admission, two refresh-token rotations, a stolen-token replay that
//! locks the account, and a credential change that unlocks it under a new version.

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
// self
use shortener_guard::{
	account::MemoryDirectory,
	admission::{AdmissionConfig, AdmissionController},
	auth::{AccountId, AccountVersion, RefreshClaims, TokenId},
	ledger::RefreshLedger,
	session::SessionGate,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let limiter = AdmissionController::new(&AdmissionConfig::from_json(
		r#"{"capacity":5,"window_ms":1000}"#,
	)?)?;
	let accounts = Arc::new(MemoryDirectory::default());
	let gate =
		SessionGate::new(RefreshLedger::new(Arc::new(MemoryStore::default())), accounts.clone());
	let owner = AccountId::new("acct-demo")?;

	accounts.register(owner.clone(), AccountVersion(1));

	let issue = |id: &str, version: u64| -> Result<RefreshClaims> {
		Ok(RefreshClaims::new(
			TokenId::new(id)?,
			owner.clone(),
			AccountVersion(version),
			OffsetDateTime::now_utc() + Duration::days(7),
		))
	};

	for id in ["rt-1", "rt-2"] {
		let presented = issue(id, 1)?;

		println!("Admission for 192.0.2.1: {:?}.", limiter.admit("192.0.2.1"));
		println!("Refresh with {id}: {:?}.", gate.begin_refresh(&presented).await?);
	}

	println!("Replaying rt-1: {:?}.", gate.begin_refresh(&issue("rt-1", 1)?).await?);
	println!("Account record after replay: {:?}.", accounts.record(&owner));

	let version = accounts.bump_version(&owner);

	println!("Credentials changed, account now at {version:?}.");
	println!("Refresh with old version: {:?}.", gate.begin_refresh(&issue("rt-3", 1)?).await?);
	println!("Refresh with new version: {:?}.", gate.begin_refresh(&issue("rt-4", 2)?).await?);
	println!("Refresh counters: {:?}.", gate.metrics());

	limiter.shutdown(StdDuration::from_secs(1)).await?;

	Ok(())
}
