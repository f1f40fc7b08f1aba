//! Confirmation token identifiers.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const TOKEN_LEN: usize = 64;

/// Unguessable, single-use confirmation credential.
///
/// Tokens are 64 lowercase hex characters drawn from two v4 UUIDs, giving
/// well over 128 bits of randomness.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmToken(String);

impl ConfirmToken {
    /// Mints a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        Self(format!("{}{}", first.simple(), second.simple()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConfirmToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConfirmToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConfirmToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TOKEN_LEN {
            return Err(Error::MalformedToken {
                reason: "unexpected token length",
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(Error::MalformedToken {
                reason: "token must be lowercase hex",
            });
        }
        Ok(Self(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_round_trip_and_differ() {
        let first = ConfirmToken::generate();
        let second = ConfirmToken::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), TOKEN_LEN);

        let parsed = first.to_string().parse::<ConfirmToken>().expect("parse");
        assert_eq!(parsed, first);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!("".parse::<ConfirmToken>().is_err());
        assert!("abc".parse::<ConfirmToken>().is_err());
        let upper = "A".repeat(TOKEN_LEN);
        assert!(upper.parse::<ConfirmToken>().is_err());
    }
}
