//! Auth-domain identifiers, account versions, and decoded refresh-token claims.

pub mod claims;
pub mod id;

pub use claims::*;
pub use id::*;
