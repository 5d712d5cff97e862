//! Permission kinds evaluated against path resources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three independently resolved permission kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// List a directory or read file bytes.
    Read,
    /// Create, rename, move, or delete.
    Write,
    /// Change properties such as access groups.
    Execute,
}

impl Permission {
    /// All kinds, in resolution order.
    pub const ALL: [Permission; 3] = [Self::Read, Self::Write, Self::Execute];

    /// Position of this kind inside per-kind arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Execute => 2,
        }
    }

    /// Return the lowercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "execute" => Ok(Self::Execute),
            other => Err(format!("Unknown permission: {other}")),
        }
    }
}
