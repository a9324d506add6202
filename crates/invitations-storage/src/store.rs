//! The InvitationStore trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait the `invitations` core depends on.
///
/// Invitations are keyed by token. A token that is currently claimed by an
/// in-flight redemption is invisible to every read (`NotFound`) until the claim
/// is released. A claim older than the backend's claim timeout counts as
/// abandoned: the invitation is visible and claimable again.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait InvitationStore: Send + Sync {
    // ───────────────────────────────────── Invitations ────────────────────────────────────

    /// Store a new invitation. Fails with `AlreadyExists` if the token is taken.
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<StoredInvitation, StoreError>;

    /// Get an unclaimed invitation by token.
    async fn get_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError>;

    /// List all unclaimed invitations of a scope, oldest first.
    async fn list_invitations(&self, scope_id: &ScopeId)
        -> Result<Vec<StoredInvitation>, StoreError>;

    /// Delete an invitation (explicit revocation), claimed or not.
    async fn remove_invitation(&self, token: &str) -> Result<(), StoreError>;

    // ───────────────────────────────────── Consumption ────────────────────────────────────

    /// Atomically claim an unclaimed invitation for a single-use redemption.
    ///
    /// At most one concurrent caller succeeds; every other caller observes
    /// `NotFound` until the claim is released or times out.
    async fn claim_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError>;

    /// Finish a claim after a successful grant: the invitation is deleted.
    async fn complete_claim(&self, token: &str) -> Result<(), StoreError>;

    /// Abandon a claim after a failed grant: the invitation becomes valid again.
    async fn release_claim(&self, token: &str) -> Result<(), StoreError>;
}
