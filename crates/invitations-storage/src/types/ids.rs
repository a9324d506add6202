//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use std::fmt;

use uuid::Uuid;

/// User identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Scope (project) identifier as known to the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub String);

/// Role identifier as known to the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleId(pub String);

/// Group key as known to the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
