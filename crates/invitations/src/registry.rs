//! Lookup from invitation type id to its implementation.

use std::collections::HashMap;
use std::sync::Arc;

use invitations_storage::{InvitationStore, StoreError, StoredInvitation};

use crate::error::InvitationError;
use crate::host::{Scope, ScopeRegistry};
use crate::invitation::Invitation;
use crate::kind::InvitationType;

/// An invitation decoded together with the type that owns it.
#[derive(Clone)]
pub struct ResolvedInvitation {
    pub kind: Arc<dyn InvitationType>,
    pub invitation: Invitation,
}

#[derive(Default)]
pub struct InvitationRegistry {
    types: HashMap<&'static str, Arc<dyn InvitationType>>,
}

impl InvitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; its id must not be taken.
    pub fn register(&mut self, kind: Arc<dyn InvitationType>) -> Result<(), InvitationError> {
        let id = kind.id();
        if self.types.contains_key(id) {
            return Err(InvitationError::DuplicateType(id.to_string()));
        }
        self.types.insert(id, kind);
        Ok(())
    }

    pub fn get(&self, type_id: &str) -> Option<Arc<dyn InvitationType>> {
        self.types.get(type_id).cloned()
    }

    /// All registered types, ordered by id.
    pub fn types(&self) -> Vec<Arc<dyn InvitationType>> {
        let mut types: Vec<_> = self.types.values().cloned().collect();
        types.sort_by_key(|kind| kind.id());
        types
    }

    /// Decode a stored row with the type named in it.
    pub fn decode(
        &self,
        stored: &StoredInvitation,
        scope: &Scope,
    ) -> Result<ResolvedInvitation, InvitationError> {
        let kind = self
            .get(&stored.type_id)
            .ok_or_else(|| InvitationError::UnknownType(stored.type_id.clone()))?;
        let invitation = kind.read_from(&stored.record, scope)?;
        if invitation.token() != stored.token {
            return Err(InvitationError::MalformedRecord(format!(
                "record token does not match stored token for type {}",
                stored.type_id
            )));
        }
        Ok(ResolvedInvitation { kind, invitation })
    }

    /// Map a presented token to its invitation.
    ///
    /// Unknown tokens, consumed or in-flight single-use tokens, and tokens whose
    /// scope no longer exists all yield [`InvitationError::UnknownToken`].
    pub async fn resolve(
        &self,
        store: &dyn InvitationStore,
        scopes: &dyn ScopeRegistry,
        token: &str,
    ) -> Result<ResolvedInvitation, InvitationError> {
        let stored = match store.get_invitation(token).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound) => return Err(InvitationError::UnknownToken),
            Err(e) => return Err(e.into()),
        };

        let Some(scope) = scopes.find_scope(&stored.scope_id).await? else {
            tracing::debug!(scope = %stored.scope_id, "Invitation scope no longer exists");
            return Err(InvitationError::UnknownToken);
        };

        self.decode(&stored, &scope)
    }
}
