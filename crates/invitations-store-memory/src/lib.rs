//! In-memory invitation store backed by a concurrent hash map.
//!
//! This implementation is suitable for:
//! - Single server deployments that can afford to lose invitations on restart
//! - Development and testing
//!
//! For durable storage, use the SQLite store instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use invitations_storage::{
    CreateInvitationParams, InvitationStore, ScopeId, StoreError, StoredInvitation,
    DEFAULT_CLAIM_TIMEOUT_SECS,
};

struct Slot {
    invitation: StoredInvitation,
    seq: u64,
    claimed_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Claimed, and the claim has not yet timed out.
    fn is_claimed(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.claimed_at.is_some_and(|at| now - at < timeout)
    }
}

/// In-memory invitation store.
///
/// Every per-token operation runs under the map's shard lock for that token,
/// so claiming is a single atomic check-and-set.
pub struct MemoryInvitationStore {
    invitations: Arc<DashMap<String, Slot>>,
    next_seq: AtomicU64,
    claim_timeout: Duration,
}

impl MemoryInvitationStore {
    pub fn new() -> Self {
        Self {
            invitations: Arc::new(DashMap::new()),
            next_seq: AtomicU64::new(0),
            claim_timeout: Duration::seconds(DEFAULT_CLAIM_TIMEOUT_SECS),
        }
    }

    /// Treat claims older than `timeout` as abandoned.
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    /// Number of stored invitations, claimed ones included.
    pub fn len(&self) -> usize {
        self.invitations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invitations.is_empty()
    }
}

impl Default for MemoryInvitationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvitationStore for MemoryInvitationStore {
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<StoredInvitation, StoreError> {
        match self.invitations.entry(params.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(vacant) => {
                let invitation = StoredInvitation {
                    token: params.token.clone(),
                    scope_id: params.scope_id.clone(),
                    type_id: params.type_id.clone(),
                    record: params.record.clone(),
                    created_at: Utc::now(),
                };
                vacant.insert(Slot {
                    invitation: invitation.clone(),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    claimed_at: None,
                });
                Ok(invitation)
            }
        }
    }

    async fn get_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError> {
        let now = Utc::now();
        match self.invitations.get(token) {
            Some(slot) if !slot.is_claimed(now, self.claim_timeout) => {
                Ok(slot.invitation.clone())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn list_invitations(
        &self,
        scope_id: &ScopeId,
    ) -> Result<Vec<StoredInvitation>, StoreError> {
        let now = Utc::now();
        let mut found: Vec<(u64, StoredInvitation)> = self
            .invitations
            .iter()
            .filter(|slot| {
                !slot.is_claimed(now, self.claim_timeout) && &slot.invitation.scope_id == scope_id
            })
            .map(|slot| (slot.seq, slot.invitation.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, inv)| inv).collect())
    }

    async fn remove_invitation(&self, token: &str) -> Result<(), StoreError> {
        self.invitations
            .remove(token)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn claim_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError> {
        let now = Utc::now();
        match self.invitations.get_mut(token) {
            Some(mut slot) if !slot.is_claimed(now, self.claim_timeout) => {
                slot.claimed_at = Some(now);
                Ok(slot.invitation.clone())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn complete_claim(&self, token: &str) -> Result<(), StoreError> {
        self.invitations
            .remove_if(token, |_, slot| slot.claimed_at.is_some())
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn release_claim(&self, token: &str) -> Result<(), StoreError> {
        match self.invitations.get_mut(token) {
            Some(mut slot) if slot.claimed_at.is_some() => {
                slot.claimed_at = None;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invitations_storage::InvitationRecord;

    fn params(token: &str, scope: &str) -> CreateInvitationParams {
        CreateInvitationParams {
            token: token.to_string(),
            scope_id: ScopeId(scope.to_string()),
            type_id: "joinProjectInvitation".to_string(),
            record: [("token", token), ("multi", "true")].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = MemoryInvitationStore::new();
        let created = store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        let fetched = store.get_invitation("t1").await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.record.get("multi"), Some("true"));
    }

    #[tokio::test]
    async fn duplicate_token_maps_to_already_exists() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        let err = store
            .create_invitation(&params("t1", "Proj2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn list_is_scoped_and_ordered() {
        let store = MemoryInvitationStore::new();
        for token in ["a3", "a1", "a2"] {
            store.create_invitation(&params(token, "Proj1")).await.unwrap();
        }
        store.create_invitation(&params("b1", "Proj2")).await.unwrap();

        let listed = store
            .list_invitations(&ScopeId("Proj1".to_string()))
            .await
            .unwrap();
        let tokens: Vec<&str> = listed.iter().map(|i| i.token.as_str()).collect();
        assert_eq!(tokens, vec!["a3", "a1", "a2"]);
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let store = MemoryInvitationStore::new();
        assert!(matches!(
            store.remove_invitation("nope").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn claimed_invitation_is_hidden() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();

        assert!(matches!(
            store.get_invitation("t1").await,
            Err(StoreError::NotFound)
        ));
        assert!(store
            .list_invitations(&ScopeId("Proj1".to_string()))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.claim_invitation("t1").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn complete_claim_deletes() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();
        store.complete_claim("t1").await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn complete_requires_claim() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        assert!(matches!(
            store.complete_claim("t1").await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn release_claim_restores() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();
        store.release_claim("t1").await.unwrap();

        assert!(store.get_invitation("t1").await.is_ok());
        assert!(matches!(
            store.release_claim("t1").await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryInvitationStore::new());
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_invitation("t1").await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn stale_claim_is_visible_again() {
        let store = MemoryInvitationStore::new().with_claim_timeout(Duration::zero());
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();

        assert!(store.get_invitation("t1").await.is_ok());
        assert_eq!(
            store
                .list_invitations(&ScopeId("Proj1".to_string()))
                .await
                .unwrap()
                .len(),
            1
        );
        // A stale claim can be taken over, and the new claim completed.
        store.claim_invitation("t1").await.unwrap();
        store.complete_claim("t1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn fresh_claim_does_not_expire() {
        let store = MemoryInvitationStore::new().with_claim_timeout(Duration::hours(1));
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();
        assert!(matches!(
            store.claim_invitation("t1").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn claimed_invitation_can_be_revoked() {
        let store = MemoryInvitationStore::new();
        store.create_invitation(&params("t1", "Proj1")).await.unwrap();

        store.claim_invitation("t1").await.unwrap();
        store.remove_invitation("t1").await.unwrap();

        assert!(matches!(
            store.complete_claim("t1").await,
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn memory_store_default() {
        let store = MemoryInvitationStore::default();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn record_is_stored_verbatim() {
        let store = MemoryInvitationStore::new();
        let mut record = InvitationRecord::new();
        record.insert("token", "t1");
        record.insert("roleId", "PROJECT_DEVELOPER");
        let mut p = params("t1", "Proj1");
        p.record = record.clone();
        store.create_invitation(&p).await.unwrap();

        assert_eq!(store.get_invitation("t1").await.unwrap().record, record);
    }
}
