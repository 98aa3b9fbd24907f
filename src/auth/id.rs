//! Strongly typed identifiers for refresh tokens and the accounts that own them.
//!
//! Both identifiers arrive as JWT claims (`jti`, `sub`) that were already verified by the token
//! layer; validation here only guards the store key space against empty or whitespace values.

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

macro_rules! claim_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(Arc<str>);
		impl $name {
			/// Validates and wraps a claim value.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let value = value.as_ref();

				check_claim($kind, value)?;

				Ok(Self(Arc::from(value)))
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0.as_ref().to_owned()
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when a claim identifier fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (token, account).
		kind: &'static str,
	},
	/// The identifier contains whitespace or control characters.
	#[error("{kind} identifier contains whitespace or control characters.")]
	InvalidCharacter {
		/// Kind of identifier (token, account).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed byte length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (token, account).
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

claim_id! { TokenId, "Unique identifier of one issued refresh token (the `jti` claim).", "Token" }
claim_id! { AccountId, "Identifier of the account a token was issued to (the `sub` claim).", "Account" }

fn check_claim(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		Err(IdentifierError::Empty { kind })
	} else if value.len() > IDENTIFIER_MAX_LEN {
		Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN })
	} else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
		Err(IdentifierError::InvalidCharacter { kind })
	} else {
		Ok(())
	}
}
