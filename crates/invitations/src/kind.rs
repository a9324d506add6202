//! The contract every invitation type implements.

use async_trait::async_trait;
use invitations_storage::{GroupKey, InvitationRecord, RoleId};

use crate::error::InvitationError;
use crate::form::{validate_common, ActionErrors, InvitationForm};
use crate::host::{Group, Principal, Role, Scope};
use crate::invitation::Invitation;
use crate::navigation::Navigation;

/// Prefill values for the creation/edit form of an invitation type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditPropertiesView {
    pub view_path: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub groups: Vec<Group>,
    pub multiuser: bool,
    pub role_id: Option<RoleId>,
    pub group_key: Option<GroupKey>,
    pub welcome_text: String,
}

/// A kind of invitation: how to build, store, gate, and redeem it.
///
/// Implementations are stateless apart from handles to host services and are
/// shared by every invitation of their kind.
#[async_trait]
pub trait InvitationType: Send + Sync {
    /// Stable identifier, unique across registered types.
    fn id(&self) -> &'static str;

    /// Human-readable label.
    fn description(&self) -> &'static str;

    fn description_view_path(&self) -> String;

    async fn edit_properties_view(
        &self,
        principal: &Principal,
        scope: &Scope,
        existing: Option<&Invitation>,
    ) -> Result<EditPropertiesView, InvitationError>;

    /// Record problems with `form` in `errors`.
    fn validate(&self, form: &InvitationForm, _scope: &Scope, errors: &mut ActionErrors) {
        validate_common(form, errors);
    }

    /// Build a new invitation from a validated form.
    fn create_from_form(
        &self,
        inviter: &Principal,
        form: &InvitationForm,
        scope: &Scope,
        token: String,
    ) -> Result<Invitation, InvitationError>;

    /// Decode a stored record; the inverse of [`Invitation::write_to`].
    fn read_from(
        &self,
        record: &InvitationRecord,
        scope: &Scope,
    ) -> Result<Invitation, InvitationError>;

    /// May `principal` see and create invitations of this type for `scope`?
    async fn is_available_for(
        &self,
        principal: &Principal,
        scope: &Scope,
    ) -> Result<bool, InvitationError>;

    /// May `invitation` be used on the authority of `principal`?
    async fn is_invitation_available_for(
        &self,
        invitation: &Invitation,
        principal: &Principal,
    ) -> Result<bool, InvitationError>;

    /// Apply the grant to the redeeming `principal` and pick where to send them.
    ///
    /// An error means nothing was granted, except for
    /// [`InvitationError::PartialGrant`]. Once the grant is fully applied this
    /// must return `Ok`.
    async fn invitation_accepted(
        &self,
        invitation: &Invitation,
        principal: &Principal,
    ) -> Result<Navigation, InvitationError>;

    async fn describe(&self, invitation: &Invitation) -> String {
        format!("'{}'", invitation.name())
    }
}
