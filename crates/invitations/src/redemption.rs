//! Redeeming a presented token.
//!
//! A redemption moves through [`RedemptionState`] in order. Failing to resolve
//! the token or to authorize it halts with an error and no side effects. Once
//! authorized, a failure while applying the grant is logged and downgraded to a
//! redirect home; it never reaches the caller.
//!
//! Invitations that are not reusable are claimed in the store before the grant,
//! so concurrent redemptions of one token cannot both proceed. The claim is
//! completed (the invitation deleted) once any part of the grant has been
//! applied, and released when nothing was, leaving the token valid for a retry.

use invitations_storage::{InvitationStore, StoreError};

use crate::error::InvitationError;
use crate::host::{HostServices, Principal};
use crate::invitation::Invitation;
use crate::kind::InvitationType;
use crate::navigation::Navigation;
use crate::registry::{InvitationRegistry, ResolvedInvitation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedemptionState {
    /// Token received, not yet looked up.
    Presented,
    /// Token mapped to an invitation and its type.
    Resolved,
    /// The invitation may be used.
    Authorized,
    /// Grant applied.
    Granted,
}

/// Outcome of an invitation request that was not refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    /// Last state reached.
    pub state: RedemptionState,
    pub navigation: Navigation,
    /// Whether this redemption used up a single-use invitation.
    pub consumed: bool,
}

pub struct RedemptionFlow<'a> {
    registry: &'a InvitationRegistry,
    store: &'a dyn InvitationStore,
    host: &'a HostServices,
}

impl<'a> RedemptionFlow<'a> {
    pub fn new(
        registry: &'a InvitationRegistry,
        store: &'a dyn InvitationStore,
        host: &'a HostServices,
    ) -> Self {
        Self {
            registry,
            store,
            host,
        }
    }

    pub async fn redeem(
        &self,
        token: &str,
        principal: &Principal,
    ) -> Result<Redemption, InvitationError> {
        let ResolvedInvitation { kind, invitation } = self
            .registry
            .resolve(self.store, self.host.scopes.as_ref(), token)
            .await?;

        self.authorize(kind.as_ref(), &invitation).await?;

        let single_use = !invitation.is_reusable();
        if single_use {
            match self.store.claim_invitation(token).await {
                Ok(_) => {}
                Err(StoreError::NotFound) => {
                    tracing::debug!(
                        scope = %invitation.scope().id,
                        user = %principal.id,
                        "Invitation already consumed"
                    );
                    return Err(InvitationError::UnknownToken);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match kind.invitation_accepted(&invitation, principal).await {
            Ok(navigation) => {
                if single_use {
                    self.finish_claim(token).await;
                }
                let consumed = single_use;
                tracing::info!(
                    invitation_type = invitation.type_id(),
                    scope = %invitation.scope().id,
                    user = %principal.id,
                    consumed,
                    "Invitation redeemed"
                );
                Ok(Redemption {
                    state: RedemptionState::Granted,
                    navigation,
                    consumed,
                })
            }
            Err(e) => {
                tracing::warn!(
                    user = %principal.describe(),
                    scope = %invitation.scope().id,
                    error = %e,
                    "Failed to apply invitation for the invited user"
                );
                // Part of the grant stuck, so the token counts as used.
                let consumed = single_use && matches!(e, InvitationError::PartialGrant(_));
                if consumed {
                    self.finish_claim(token).await;
                } else if single_use {
                    self.abandon_claim(token).await;
                }
                Ok(Redemption {
                    state: RedemptionState::Authorized,
                    navigation: Navigation::home(),
                    consumed,
                })
            }
        }
    }

    /// The invitation must still be backed by its issuer's authority.
    ///
    /// Host failures while checking are logged and refuse the redemption.
    async fn authorize(
        &self,
        kind: &dyn InvitationType,
        invitation: &Invitation,
    ) -> Result<(), InvitationError> {
        match self.issuer_authorizes(kind, invitation).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(InvitationError::Forbidden),
            Err(e) => {
                tracing::warn!(
                    issuer = %invitation.created_by(),
                    scope = %invitation.scope().id,
                    error = %e,
                    "Could not verify invitation issuer"
                );
                Err(InvitationError::Forbidden)
            }
        }
    }

    async fn issuer_authorizes(
        &self,
        kind: &dyn InvitationType,
        invitation: &Invitation,
    ) -> Result<bool, InvitationError> {
        let Some(issuer) = self.host.users.find_user(invitation.created_by()).await? else {
            tracing::debug!(
                issuer = %invitation.created_by(),
                "Invitation issuer no longer exists"
            );
            return Ok(false);
        };

        let available = kind.is_invitation_available_for(invitation, &issuer).await?;
        if !available {
            tracing::debug!(
                issuer = %issuer.id,
                scope = %invitation.scope().id,
                "Invitation issuer lacks authority over the scope"
            );
        }
        Ok(available)
    }

    async fn finish_claim(&self, token: &str) {
        match self.store.complete_claim(token).await {
            Ok(()) => {}
            // Revoked while the grant ran.
            Err(StoreError::NotFound) => {
                tracing::debug!("Invitation removed before its claim completed");
            }
            Err(e) => tracing::error!(error = %e, "Failed to complete invitation claim"),
        }
    }

    /// A claim that cannot be released still expires after the store's claim timeout.
    async fn abandon_claim(&self, token: &str) {
        match self.store.release_claim(token).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => tracing::error!(error = %e, "Failed to release invitation claim"),
        }
    }
}
