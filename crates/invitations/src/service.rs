//! Host-facing entry points: creating, listing, revoking and redeeming
//! invitations.

use std::sync::Arc;

use invitations_storage::{CreateInvitationParams, InvitationStore, ScopeId, StoreError};

use crate::config::InvitationsConfig;
use crate::error::InvitationError;
use crate::form::{ActionErrors, InvitationForm};
use crate::host::{HostServices, Principal, Scope};
use crate::invitation::Invitation;
use crate::join_project::JoinProjectInvitationType;
use crate::kind::{EditPropertiesView, InvitationType};
use crate::navigation::Navigation;
use crate::redemption::{Redemption, RedemptionFlow, RedemptionState};
use crate::registry::{InvitationRegistry, ResolvedInvitation};
use crate::token::mint_token;

pub struct InvitationService {
    registry: Arc<InvitationRegistry>,
    store: Arc<dyn InvitationStore>,
    host: HostServices,
    config: InvitationsConfig,
}

impl InvitationService {
    pub fn new(
        registry: Arc<InvitationRegistry>,
        store: Arc<dyn InvitationStore>,
        host: HostServices,
        config: InvitationsConfig,
    ) -> Self {
        Self {
            registry,
            store,
            host,
            config,
        }
    }

    /// A service with the built-in invitation types registered.
    pub fn with_default_types(
        store: Arc<dyn InvitationStore>,
        host: HostServices,
        config: InvitationsConfig,
    ) -> Result<Self, InvitationError> {
        let mut registry = InvitationRegistry::new();
        registry.register(Arc::new(JoinProjectInvitationType::new(
            host.clone(),
            config.clone(),
        )))?;
        Ok(Self::new(Arc::new(registry), store, host, config))
    }

    pub fn registry(&self) -> &InvitationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &InvitationsConfig {
        &self.config
    }

    async fn scope(&self, scope_id: &ScopeId) -> Result<Scope, InvitationError> {
        self.host
            .scopes
            .find_scope(scope_id)
            .await?
            .ok_or_else(|| InvitationError::UnknownScope(scope_id.clone()))
    }

    fn kind(&self, type_id: &str) -> Result<Arc<dyn InvitationType>, InvitationError> {
        self.registry
            .get(type_id)
            .ok_or_else(|| InvitationError::UnknownType(type_id.to_string()))
    }

    /// Types `principal` may create invitations of in `scope_id`.
    pub async fn available_types(
        &self,
        principal: &Principal,
        scope_id: &ScopeId,
    ) -> Result<Vec<Arc<dyn InvitationType>>, InvitationError> {
        let scope = self.scope(scope_id).await?;
        let mut available = Vec::new();
        for kind in self.registry.types() {
            if kind.is_available_for(principal, &scope).await? {
                available.push(kind);
            }
        }
        Ok(available)
    }

    /// Form prefill for a new invitation, or for the one behind `token`.
    pub async fn edit_properties_view(
        &self,
        principal: &Principal,
        scope_id: &ScopeId,
        type_id: &str,
        token: Option<&str>,
    ) -> Result<EditPropertiesView, InvitationError> {
        let kind = self.kind(type_id)?;
        let scope = self.scope(scope_id).await?;
        if !kind.is_available_for(principal, &scope).await? {
            return Err(InvitationError::Forbidden);
        }

        let existing = match token {
            Some(token) => {
                let resolved = self.find_invitation(token).await?;
                if resolved.invitation.scope().id != scope.id
                    || resolved.invitation.type_id() != kind.id()
                {
                    return Err(InvitationError::UnknownToken);
                }
                Some(resolved.invitation)
            }
            None => None,
        };
        kind.edit_properties_view(principal, &scope, existing.as_ref())
            .await
    }

    pub async fn create_invitation(
        &self,
        principal: &Principal,
        scope_id: &ScopeId,
        type_id: &str,
        form: &InvitationForm,
    ) -> Result<Invitation, InvitationError> {
        let kind = self.kind(type_id)?;
        let scope = self.scope(scope_id).await?;
        if !kind.is_available_for(principal, &scope).await? {
            return Err(InvitationError::Forbidden);
        }

        let mut errors = ActionErrors::new();
        kind.validate(form, &scope, &mut errors);
        if errors.has_errors() {
            return Err(InvitationError::Validation(errors));
        }

        let invitation =
            kind.create_from_form(principal, form, &scope, mint_token(self.config.token_bytes))?;
        self.store
            .create_invitation(&CreateInvitationParams {
                token: invitation.token().to_string(),
                scope_id: scope.id.clone(),
                type_id: kind.id().to_string(),
                record: invitation.to_record(),
            })
            .await?;

        tracing::info!(
            invitation_type = kind.id(),
            scope = %scope.id,
            created_by = %principal.id,
            multi = invitation.is_multi(),
            "Invitation created"
        );
        Ok(invitation)
    }

    /// Map a token to its invitation and type.
    pub async fn find_invitation(&self, token: &str) -> Result<ResolvedInvitation, InvitationError> {
        self.registry
            .resolve(self.store.as_ref(), self.host.scopes.as_ref(), token)
            .await
    }

    /// Invitations of `scope_id` whose type `principal` may manage, oldest first.
    pub async fn list_invitations(
        &self,
        principal: &Principal,
        scope_id: &ScopeId,
    ) -> Result<Vec<Invitation>, InvitationError> {
        let scope = self.scope(scope_id).await?;
        let mut listed = Vec::new();
        for stored in self.store.list_invitations(&scope.id).await? {
            let resolved = match self.registry.decode(&stored, &scope) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::warn!(
                        scope = %scope.id,
                        invitation_type = %stored.type_id,
                        error = %e,
                        "Skipping undecodable invitation"
                    );
                    continue;
                }
            };
            if resolved.kind.is_available_for(principal, &scope).await? {
                listed.push(resolved.invitation);
            }
        }
        Ok(listed)
    }

    pub async fn revoke_invitation(
        &self,
        principal: &Principal,
        scope_id: &ScopeId,
        token: &str,
    ) -> Result<(), InvitationError> {
        let ResolvedInvitation { kind, invitation } = self.find_invitation(token).await?;
        if &invitation.scope().id != scope_id {
            return Err(InvitationError::UnknownToken);
        }
        if !kind.is_available_for(principal, invitation.scope()).await? {
            return Err(InvitationError::Forbidden);
        }

        match self.store.remove_invitation(token).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(InvitationError::UnknownToken),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            invitation_type = kind.id(),
            scope = %scope_id,
            revoked_by = %principal.id,
            "Invitation revoked"
        );
        Ok(())
    }

    /// Handle a request carrying `token`.
    ///
    /// Anonymous visitors are sent to registration once the token is known to
    /// resolve. Authenticated visitors redeem it.
    pub async fn process_request(
        &self,
        token: &str,
        principal: Option<&Principal>,
    ) -> Result<Redemption, InvitationError> {
        match principal {
            Some(principal) => {
                RedemptionFlow::new(&self.registry, self.store.as_ref(), &self.host)
                    .redeem(token, principal)
                    .await
            }
            None => {
                self.find_invitation(token).await?;
                Ok(Redemption {
                    state: RedemptionState::Resolved,
                    navigation: Navigation::redirect(self.config.register_path.clone()),
                    consumed: false,
                })
            }
        }
    }
}
