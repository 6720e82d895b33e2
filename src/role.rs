//! The two fixed protocol roles (spec.md §1, §3).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Alice,
    Bob,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Alice => Role::Bob,
            Role::Bob => Role::Alice,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Alice => "alice",
            Role::Bob => "bob",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_is_involutive() {
        assert_eq!(Role::Alice.peer().peer(), Role::Alice);
        assert_eq!(Role::Alice.peer(), Role::Bob);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Alice).unwrap(), "\"alice\"");
        assert_eq!(serde_json::to_string(&Role::Bob).unwrap(), "\"bob\"");
    }
}
