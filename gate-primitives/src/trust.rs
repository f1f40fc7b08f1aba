//! Trust level ordering.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Process trust state, ordered `Untrusted < Verified < Trusted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// No trust has been granted; the initial state.
    #[default]
    Untrusted,
    /// The caller has been verified but not fully trusted.
    Verified,
    /// Full trust; every non-destructive tool may run unconfirmed.
    Trusted,
}

impl TrustLevel {
    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untrusted => "UNTRUSTED",
            Self::Verified => "VERIFIED",
            Self::Trusted => "TRUSTED",
        }
    }

    /// Returns `true` when this level meets the supplied minimum.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl Display for TrustLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNTRUSTED" => Ok(Self::Untrusted),
            "VERIFIED" => Ok(Self::Verified),
            "TRUSTED" => Ok(Self::Trusted),
            _ => Err(Error::UnknownTrustLevel {
                label: s.to_owned(),
            }),
        }
    }
}
