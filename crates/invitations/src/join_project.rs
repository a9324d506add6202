//! Invitation to join a project with a role, a group membership, or both.

use async_trait::async_trait;
use invitations_storage::{GroupKey, InvitationRecord, RoleId};

use crate::config::InvitationsConfig;
use crate::error::InvitationError;
use crate::form::{
    validate_common, ActionErrors, InvalidProperty, InvitationForm, GROUP_PARAM, NAME_PARAM,
    ROLE_PARAM,
};
use crate::host::{Group, HostServices, Permission, Principal, Role, Scope};
use crate::invitation::{
    Invitation, InvitationBase, InvitationPayload, JoinProjectGrant,
};
use crate::kind::{EditPropertiesView, InvitationType};
use crate::navigation::Navigation;
use crate::privilege::{Authority, Elevation};

pub const JOIN_PROJECT_TYPE_ID: &str = "joinProjectInvitation";

const ROLE_OR_GROUP_REQUIRED: &str = "Either the role or the group must be specified";

pub struct JoinProjectInvitationType {
    host: HostServices,
    config: InvitationsConfig,
}

impl JoinProjectInvitationType {
    pub fn new(host: HostServices, config: InvitationsConfig) -> Self {
        Self { host, config }
    }

    pub fn default_welcome_text(inviter: &Principal, scope: &Scope) -> String {
        format!(
            "{} invites you to join the {} project",
            inviter.descriptive_name, scope.full_name
        )
    }

    /// Build a join invitation. Fails unless a role or a group is given.
    #[allow(clippy::too_many_arguments)]
    pub fn create_invitation(
        &self,
        inviter: &Principal,
        name: &str,
        token: String,
        scope: &Scope,
        role_id: Option<RoleId>,
        group_key: Option<GroupKey>,
        multi: bool,
        welcome_text: &str,
    ) -> Result<Invitation, InvitationError> {
        let grant = JoinProjectGrant::new(role_id, group_key)?;
        let base = InvitationBase {
            token,
            multi,
            name: name.to_string(),
            welcome_text: welcome_text.to_string(),
            created_by: inviter.id.clone(),
        };
        Ok(Invitation::new(
            base,
            JOIN_PROJECT_TYPE_ID,
            scope.clone(),
            InvitationPayload::JoinProject(grant),
        ))
    }

    /// The user who issued `invitation`, if they still exist.
    pub async fn created_by(
        &self,
        invitation: &Invitation,
    ) -> Result<Option<Principal>, InvitationError> {
        Ok(self.host.users.find_user(invitation.created_by()).await?)
    }

    async fn find_role(
        &self,
        authority: Authority<'_>,
        grant: &JoinProjectGrant,
    ) -> Result<Option<Role>, InvitationError> {
        match grant.role_id() {
            Some(role_id) => Ok(self.host.roles.find_role(authority, role_id).await?),
            None => Ok(None),
        }
    }

    async fn find_group(
        &self,
        authority: Authority<'_>,
        grant: &JoinProjectGrant,
    ) -> Result<Option<Group>, InvitationError> {
        match grant.group_key() {
            Some(group_key) => Ok(self.host.roles.find_group(authority, group_key).await?),
            None => Ok(None),
        }
    }

    /// Groups the principal may hand out that can already see the project.
    async fn offered_groups(
        &self,
        principal: &Principal,
        scope: &Scope,
    ) -> Result<Vec<Group>, InvitationError> {
        let mut offered = Vec::new();
        for group in self.host.roles.available_groups().await? {
            let granted = self.host.roles.group_permissions(&group, &scope.id).await?;
            if !granted.contains(&Permission::ViewProject) {
                continue;
            }
            if self
                .host
                .roles
                .can_add_to_remove_from_group(principal, &group)
                .await?
            {
                offered.push(group);
            }
        }
        Ok(offered)
    }
}

/// Weakest role that can still run builds; first listed wins ties.
fn preselect_role(roles: &[Role]) -> Option<RoleId> {
    roles
        .iter()
        .filter(|role| role.grants(Permission::RunBuild))
        .min_by_key(|role| role.permissions.len())
        .or_else(|| roles.first())
        .map(|role| role.id.clone())
}

fn join_grant(invitation: &Invitation) -> Result<&JoinProjectGrant, InvitationError> {
    invitation
        .join_project()
        .ok_or_else(|| InvitationError::UnknownType(invitation.type_id().to_string()))
}

fn or_none<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[async_trait]
impl InvitationType for JoinProjectInvitationType {
    fn id(&self) -> &'static str {
        JOIN_PROJECT_TYPE_ID
    }

    fn description(&self) -> &'static str {
        "Join project"
    }

    fn description_view_path(&self) -> String {
        self.config.resource("joinProjectInvitationDescription.jsp")
    }

    async fn edit_properties_view(
        &self,
        principal: &Principal,
        scope: &Scope,
        existing: Option<&Invitation>,
    ) -> Result<EditPropertiesView, InvitationError> {
        let roles: Vec<Role> = self
            .host
            .roles
            .available_roles()
            .await?
            .into_iter()
            .filter(|role| role.project_association_supported)
            .collect();
        let groups = self.offered_groups(principal, scope).await?;

        let view_path = self.config.resource("joinProjectInvitationProperties.jsp");
        let view = match existing {
            Some(invitation) => {
                let grant = join_grant(invitation)?;
                EditPropertiesView {
                    view_path,
                    name: invitation.name().to_string(),
                    multiuser: invitation.is_multi(),
                    role_id: grant.role_id().cloned(),
                    group_key: grant.group_key().cloned(),
                    welcome_text: invitation.welcome_text().to_string(),
                    roles,
                    groups,
                }
            }
            None => EditPropertiesView {
                view_path,
                name: self.description().to_string(),
                multiuser: true,
                role_id: preselect_role(&roles),
                group_key: None,
                welcome_text: Self::default_welcome_text(principal, scope),
                roles,
                groups,
            },
        };
        Ok(view)
    }

    fn validate(&self, form: &InvitationForm, _scope: &Scope, errors: &mut ActionErrors) {
        validate_common(form, errors);
        if form.role().is_none() && form.group().is_none() {
            errors.add_error(InvalidProperty::new(ROLE_PARAM, ROLE_OR_GROUP_REQUIRED));
            errors.add_error(InvalidProperty::new(GROUP_PARAM, ROLE_OR_GROUP_REQUIRED));
        }
    }

    fn create_from_form(
        &self,
        inviter: &Principal,
        form: &InvitationForm,
        scope: &Scope,
        token: String,
    ) -> Result<Invitation, InvitationError> {
        let welcome_text = match form.welcome_text() {
            text if text.trim().is_empty() => Self::default_welcome_text(inviter, scope),
            text => text.to_string(),
        };
        self.create_invitation(
            inviter,
            form.param(NAME_PARAM).unwrap_or_default(),
            token,
            scope,
            form.role().map(|r| RoleId(r.to_string())),
            form.group().map(|g| GroupKey(g.to_string())),
            form.multiuser(),
            &welcome_text,
        )
    }

    fn read_from(
        &self,
        record: &InvitationRecord,
        scope: &Scope,
    ) -> Result<Invitation, InvitationError> {
        let base = InvitationBase::read_from(record)?;
        let grant = JoinProjectGrant::read_from(record)?;
        Ok(Invitation::new(
            base,
            JOIN_PROJECT_TYPE_ID,
            scope.clone(),
            InvitationPayload::JoinProject(grant),
        ))
    }

    async fn is_available_for(
        &self,
        principal: &Principal,
        scope: &Scope,
    ) -> Result<bool, InvitationError> {
        let elevation = Elevation::enter("join project invitation availability");
        let granted = self
            .host
            .scopes
            .is_permission_granted(
                elevation.authority(),
                principal,
                &scope.id,
                Permission::ChangeUserRolesInProject,
            )
            .await?;
        Ok(granted)
    }

    async fn is_invitation_available_for(
        &self,
        invitation: &Invitation,
        principal: &Principal,
    ) -> Result<bool, InvitationError> {
        let grant = join_grant(invitation)?;
        let authority = Authority::caller(principal);

        let may_change_roles = self
            .host
            .scopes
            .is_permission_granted(
                authority,
                principal,
                &invitation.scope().id,
                Permission::ChangeUserRolesInProject,
            )
            .await?;
        if !may_change_roles {
            return Ok(false);
        }

        match self.find_group(authority, grant).await? {
            Some(group) => Ok(self
                .host
                .roles
                .can_add_to_remove_from_group(principal, &group)
                .await?),
            None => Ok(true),
        }
    }

    async fn invitation_accepted(
        &self,
        invitation: &Invitation,
        principal: &Principal,
    ) -> Result<Navigation, InvitationError> {
        let grant = join_grant(invitation)?;
        let scope = invitation.scope();

        {
            let elevation = Elevation::enter("join project invitation grant");
            let authority = elevation.authority();

            let role = self.find_role(authority, grant).await?;
            let group = self.find_group(authority, grant).await?;
            if role.is_none() && group.is_none() {
                return Err(InvitationError::Grant(format!(
                    "Failed to proceed invitation with a non-existing role '{}' and group '{}'",
                    or_none(grant.role_id()),
                    or_none(grant.group_key()),
                )));
            }

            if let Some(role) = &role {
                self.host
                    .roles
                    .add_role(authority, principal, role, &scope.id)
                    .await?;
                tracing::info!(
                    user = %principal.id,
                    scope = %scope.id,
                    role = %role.id,
                    "Role granted by invitation"
                );
            }
            if let Some(group) = &group {
                match self
                    .host
                    .roles
                    .assign_to_group(authority, principal, group)
                    .await
                {
                    Ok(()) => tracing::info!(
                        user = %principal.id,
                        group = %group.key,
                        "Group membership granted by invitation"
                    ),
                    Err(e) if role.is_some() => {
                        return Err(InvitationError::PartialGrant(format!(
                            "role granted but group {} could not be assigned: {e}",
                            group.describe()
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        // The grant is applied; from here on failures only affect where the user lands.
        let can_edit = match self
            .host
            .scopes
            .is_permission_granted(
                Authority::caller(principal),
                principal,
                &scope.id,
                Permission::EditProject,
            )
            .await
        {
            Ok(can_edit) => can_edit,
            Err(e) => {
                tracing::warn!(
                    user = %principal.id,
                    scope = %scope.id,
                    error = %e,
                    "Edit permission check failed after invitation grant"
                );
                false
            }
        };
        if can_edit {
            Ok(Navigation::edit_project(scope))
        } else {
            Ok(Navigation::view_project(scope))
        }
    }

    async fn describe(&self, invitation: &Invitation) -> String {
        let Some(grant) = invitation.join_project() else {
            return format!("'{}'", invitation.name());
        };
        let elevation = Elevation::enter("join project invitation description");
        let role = self
            .find_role(elevation.authority(), grant)
            .await
            .ok()
            .flatten();
        let group = self
            .find_group(elevation.authority(), grant)
            .await
            .ok()
            .flatten();
        format!(
            "'join {}, role: {}, group: {}'",
            invitation.scope().describe(),
            role.map_or_else(|| "<empty>".to_string(), |r| r.describe()),
            group.map_or_else(|| "<empty>".to_string(), |g| g.describe()),
        )
    }
}
