//! Collaborator interfaces onto the hosting platform.
//!
//! The host owns projects, roles, groups and users. The invitation core only
//! reaches them through these traits, so tests can supply fakes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use invitations_storage::{GroupKey, RoleId, ScopeId, UserId};
use thiserror::Error;

use crate::privilege::Authority;

/// Errors reported by host services.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("host error: {0}")]
    Backend(String),
}

/// Permission on a scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewProject,
    RunBuild,
    CancelBuild,
    EditProject,
    ChangeUserRolesInProject,
}

/// Error type for parsing Permission from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePermissionError(pub String);

impl fmt::Display for ParsePermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid permission: {}", self.0)
    }
}

impl std::error::Error for ParsePermissionError {}

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view_project" => Ok(Permission::ViewProject),
            "run_build" => Ok(Permission::RunBuild),
            "cancel_build" => Ok(Permission::CancelBuild),
            "edit_project" => Ok(Permission::EditProject),
            "change_user_roles_in_project" => Ok(Permission::ChangeUserRolesInProject),
            _ => Err(ParsePermissionError(s.to_string())),
        }
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewProject => "view_project",
            Permission::RunBuild => "run_build",
            Permission::CancelBuild => "cancel_build",
            Permission::EditProject => "edit_project",
            Permission::ChangeUserRolesInProject => "change_user_roles_in_project",
        }
    }
}

/// A user as resolved by the host's user registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub descriptive_name: String,
}

impl Principal {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        format!("\"{}\" {{id={}}}", self.username, self.id)
    }
}

/// The entity an invitation grants access to (a project).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub id: ScopeId,
    /// Identifier used in locations presented to users.
    pub external_id: String,
    pub name: String,
    pub full_name: String,
}

impl Scope {
    pub fn describe(&self) -> String {
        format!("\"{}\" {{id={}}}", self.full_name, self.external_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<Permission>,
    /// Whether the role can be assigned in a project (as opposed to server-wide only).
    pub project_association_supported: bool,
}

impl Role {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn describe(&self) -> String {
        format!("\"{}\" {{id={}}}", self.name, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub key: GroupKey,
    pub name: String,
}

impl Group {
    pub fn describe(&self) -> String {
        format!("\"{}\" {{key={}}}", self.name, self.key)
    }
}

/// Scope lookups and permission queries.
#[async_trait]
pub trait ScopeRegistry: Send + Sync {
    async fn find_scope(&self, scope_id: &ScopeId) -> Result<Option<Scope>, HostError>;

    /// Does `principal` hold `permission` on `scope_id`, as seen by `authority`?
    async fn is_permission_granted(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        scope_id: &ScopeId,
        permission: Permission,
    ) -> Result<bool, HostError>;
}

/// Roles, groups, and the grant side effects on them.
#[async_trait]
pub trait RoleGroupRegistry: Send + Sync {
    async fn available_roles(&self) -> Result<Vec<Role>, HostError>;

    async fn available_groups(&self) -> Result<Vec<Group>, HostError>;

    async fn find_role(
        &self,
        authority: Authority<'_>,
        role_id: &RoleId,
    ) -> Result<Option<Role>, HostError>;

    async fn find_group(
        &self,
        authority: Authority<'_>,
        group_key: &GroupKey,
    ) -> Result<Option<Group>, HostError>;

    /// Permissions the group's members receive on `scope_id`.
    async fn group_permissions(
        &self,
        group: &Group,
        scope_id: &ScopeId,
    ) -> Result<Vec<Permission>, HostError>;

    /// May `principal` add members to or remove members from `group`?
    async fn can_add_to_remove_from_group(
        &self,
        principal: &Principal,
        group: &Group,
    ) -> Result<bool, HostError>;

    /// Assign `role` to `principal` in `scope_id`. Assigning a held role is a no-op.
    async fn add_role(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        role: &Role,
        scope_id: &ScopeId,
    ) -> Result<(), HostError>;

    /// Add `principal` to `group`. Adding an existing member is a no-op.
    async fn assign_to_group(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        group: &Group,
    ) -> Result<(), HostError>;
}

#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<Principal>, HostError>;
}

/// Handles to every host service the invitation core needs.
#[derive(Clone)]
pub struct HostServices {
    pub scopes: Arc<dyn ScopeRegistry>,
    pub roles: Arc<dyn RoleGroupRegistry>,
    pub users: Arc<dyn UserRegistry>,
}

impl HostServices {
    /// Use one value for all three registries.
    pub fn from_single<H>(host: Arc<H>) -> Self
    where
        H: ScopeRegistry + RoleGroupRegistry + UserRegistry + 'static,
    {
        Self {
            scopes: host.clone(),
            roles: host.clone(),
            users: host,
        }
    }
}
