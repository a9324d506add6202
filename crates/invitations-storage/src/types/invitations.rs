//! Invitation record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScopeId;

/// Flat string-keyed representation of an invitation.
///
/// This is the durable and transport form of every invitation kind: the common
/// keys (`token`, `multi`, ...) plus whatever keys the kind adds. Keys are kept
/// sorted so two records with the same content serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationRecord(BTreeMap<String, String>);

impl InvitationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InvitationRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Stored invitation row
#[derive(Clone, Debug, PartialEq)]
pub struct StoredInvitation {
    pub token: String,
    pub scope_id: ScopeId,
    pub type_id: String, // Id of the invitation kind that can decode `record`
    pub record: InvitationRecord,
    pub created_at: DateTime<Utc>,
}

/// Parameters for storing a new invitation
#[derive(Clone, Debug)]
pub struct CreateInvitationParams {
    pub token: String,
    pub scope_id: ScopeId,
    pub type_id: String,
    pub record: InvitationRecord,
}
