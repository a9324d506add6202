//! Common test helpers: an in-process fake of the hosting platform.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use invitations_storage::{GroupKey, InvitationStore, RoleId, ScopeId, UserId};
use invitations_store_memory::MemoryInvitationStore;
use uuid::Uuid;

use crate::config::InvitationsConfig;
use crate::form::{InvitationForm, MULTIUSER_PARAM, NAME_PARAM, ROLE_PARAM};
use crate::host::{
    Group, HostError, HostServices, Permission, Principal, Role, RoleGroupRegistry, Scope,
    ScopeRegistry, UserRegistry,
};
use crate::join_project::JOIN_PROJECT_TYPE_ID;
use crate::privilege::Authority;
use crate::service::InvitationService;

pub const PROJECT_ADMIN: &str = "PROJECT_ADMIN";
pub const PROJECT_DEVELOPER: &str = "PROJECT_DEVELOPER";
pub const PROJECT_VIEWER: &str = "PROJECT_VIEWER";
pub const DEVELOPERS: &str = "DEVELOPERS";
pub const OPERATORS: &str = "OPERATORS";

/// One host call and the authority it was made under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCall {
    pub op: &'static str,
    pub system: bool,
}

#[derive(Default)]
struct State {
    scopes: HashMap<ScopeId, Scope>,
    users: HashMap<UserId, Principal>,
    roles: Vec<Role>,
    groups: Vec<Group>,
    group_permissions: HashMap<(GroupKey, ScopeId), Vec<Permission>>,
    group_admins: HashSet<(UserId, GroupKey)>,
    user_roles: HashMap<(UserId, ScopeId), Vec<RoleId>>,
    members: HashMap<GroupKey, HashSet<UserId>>,
    calls: Vec<HostCall>,
}

/// Projects, roles, groups and users held in memory.
///
/// A principal holds a permission on a scope when one of its roles in the
/// scope grants it, or when a group it belongs to does.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<State>,
    /// Fail both grant side effects.
    pub fail_grants: AtomicBool,
    /// Fail only group assignment.
    pub fail_group_grants: AtomicBool,
    /// Fail `EditProject` permission checks.
    pub fail_edit_checks: AtomicBool,
    /// Fail user lookups.
    pub fail_user_lookups: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let host = Self::default();
        {
            let mut state = host.state.lock().unwrap();
            state.roles = vec![
                role(
                    PROJECT_ADMIN,
                    &[
                        Permission::ViewProject,
                        Permission::RunBuild,
                        Permission::CancelBuild,
                        Permission::EditProject,
                        Permission::ChangeUserRolesInProject,
                    ],
                ),
                role(
                    PROJECT_DEVELOPER,
                    &[
                        Permission::ViewProject,
                        Permission::RunBuild,
                        Permission::CancelBuild,
                    ],
                ),
                role(PROJECT_VIEWER, &[Permission::ViewProject]),
            ];
            state.groups = vec![group(DEVELOPERS), group(OPERATORS)];
        }
        Arc::new(host)
    }

    pub fn add_scope(&self, external_id: &str) -> Scope {
        let scope = Scope {
            id: ScopeId(format!("project:{}", external_id.to_lowercase())),
            external_id: external_id.to_string(),
            name: external_id.to_string(),
            full_name: format!("<Root project> / {external_id}"),
        };
        self.state
            .lock()
            .unwrap()
            .scopes
            .insert(scope.id.clone(), scope.clone());
        scope
    }

    pub fn remove_scope(&self, scope_id: &ScopeId) {
        self.state.lock().unwrap().scopes.remove(scope_id);
    }

    pub fn add_user(&self, username: &str) -> Principal {
        let principal = Principal {
            id: UserId(Uuid::new_v4()),
            username: username.to_string(),
            descriptive_name: format!("{username} (test)"),
        };
        self.state
            .lock()
            .unwrap()
            .users
            .insert(principal.id.clone(), principal.clone());
        principal
    }

    pub fn remove_user(&self, user_id: &UserId) {
        self.state.lock().unwrap().users.remove(user_id);
    }

    pub fn set_roles(&self, roles: Vec<Role>) {
        self.state.lock().unwrap().roles = roles;
    }

    pub fn give_role(&self, user: &Principal, role_id: &str, scope: &Scope) {
        self.state
            .lock()
            .unwrap()
            .user_roles
            .entry((user.id.clone(), scope.id.clone()))
            .or_default()
            .push(RoleId(role_id.to_string()));
    }

    pub fn revoke_roles(&self, user: &Principal, scope: &Scope) {
        self.state
            .lock()
            .unwrap()
            .user_roles
            .remove(&(user.id.clone(), scope.id.clone()));
    }

    pub fn grant_group_on_scope(&self, group_key: &str, scope: &Scope, permissions: &[Permission]) {
        self.state.lock().unwrap().group_permissions.insert(
            (GroupKey(group_key.to_string()), scope.id.clone()),
            permissions.to_vec(),
        );
    }

    pub fn make_group_admin(&self, user: &Principal, group_key: &str) {
        self.state
            .lock()
            .unwrap()
            .group_admins
            .insert((user.id.clone(), GroupKey(group_key.to_string())));
    }

    pub fn roles_of(&self, user: &Principal, scope: &Scope) -> Vec<RoleId> {
        self.state
            .lock()
            .unwrap()
            .user_roles
            .get(&(user.id.clone(), scope.id.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_member(&self, user: &Principal, group_key: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .members
            .get(&GroupKey(group_key.to_string()))
            .is_some_and(|m| m.contains(&user.id))
    }

    pub fn calls(&self, op: &str) -> Vec<HostCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    fn record(&self, state: &mut State, op: &'static str, authority: Authority<'_>) {
        state.calls.push(HostCall {
            op,
            system: authority.is_system(),
        });
    }

    fn holds(state: &State, user_id: &UserId, scope_id: &ScopeId, permission: Permission) -> bool {
        let by_role = state
            .user_roles
            .get(&(user_id.clone(), scope_id.clone()))
            .into_iter()
            .flatten()
            .filter_map(|id| state.roles.iter().find(|r| &r.id == id))
            .any(|r| r.grants(permission));
        let by_group = state.members.iter().any(|(key, members)| {
            members.contains(user_id)
                && state
                    .group_permissions
                    .get(&(key.clone(), scope_id.clone()))
                    .is_some_and(|p| p.contains(&permission))
        });
        by_role || by_group
    }
}

#[async_trait]
impl ScopeRegistry for FakeHost {
    async fn find_scope(&self, scope_id: &ScopeId) -> Result<Option<Scope>, HostError> {
        Ok(self.state.lock().unwrap().scopes.get(scope_id).cloned())
    }

    async fn is_permission_granted(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        scope_id: &ScopeId,
        permission: Permission,
    ) -> Result<bool, HostError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "is_permission_granted", authority);
        if permission == Permission::EditProject && self.fail_edit_checks.load(Ordering::SeqCst) {
            return Err(HostError::Backend("permission service unavailable".to_string()));
        }
        // Without elevation a caller may only inspect its own permissions.
        if let Some(caller) = authority.caller_id() {
            if caller != &principal.id {
                return Err(HostError::AccessDenied(
                    "cannot inspect another user's permissions".to_string(),
                ));
            }
        }
        Ok(Self::holds(&state, &principal.id, scope_id, permission))
    }
}

#[async_trait]
impl RoleGroupRegistry for FakeHost {
    async fn available_roles(&self) -> Result<Vec<Role>, HostError> {
        Ok(self.state.lock().unwrap().roles.clone())
    }

    async fn available_groups(&self) -> Result<Vec<Group>, HostError> {
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn find_role(
        &self,
        authority: Authority<'_>,
        role_id: &RoleId,
    ) -> Result<Option<Role>, HostError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "find_role", authority);
        Ok(state.roles.iter().find(|r| &r.id == role_id).cloned())
    }

    async fn find_group(
        &self,
        authority: Authority<'_>,
        group_key: &GroupKey,
    ) -> Result<Option<Group>, HostError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "find_group", authority);
        Ok(state.groups.iter().find(|g| &g.key == group_key).cloned())
    }

    async fn group_permissions(
        &self,
        group: &Group,
        scope_id: &ScopeId,
    ) -> Result<Vec<Permission>, HostError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .group_permissions
            .get(&(group.key.clone(), scope_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn can_add_to_remove_from_group(
        &self,
        principal: &Principal,
        group: &Group,
    ) -> Result<bool, HostError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .group_admins
            .contains(&(principal.id.clone(), group.key.clone())))
    }

    async fn add_role(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        role: &Role,
        scope_id: &ScopeId,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "add_role", authority);
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(HostError::Backend("role assignment unavailable".to_string()));
        }
        if !authority.is_system() {
            return Err(HostError::AccessDenied(
                "role assignment needs elevated privilege".to_string(),
            ));
        }
        let roles = state
            .user_roles
            .entry((principal.id.clone(), scope_id.clone()))
            .or_default();
        if !roles.contains(&role.id) {
            roles.push(role.id.clone());
        }
        Ok(())
    }

    async fn assign_to_group(
        &self,
        authority: Authority<'_>,
        principal: &Principal,
        group: &Group,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "assign_to_group", authority);
        if self.fail_grants.load(Ordering::SeqCst) || self.fail_group_grants.load(Ordering::SeqCst)
        {
            return Err(HostError::Backend("group assignment unavailable".to_string()));
        }
        if !authority.is_system() {
            return Err(HostError::AccessDenied(
                "group assignment needs elevated privilege".to_string(),
            ));
        }
        state
            .members
            .entry(group.key.clone())
            .or_default()
            .insert(principal.id.clone());
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for FakeHost {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<Principal>, HostError> {
        if self.fail_user_lookups.load(Ordering::SeqCst) {
            return Err(HostError::Backend("user directory unavailable".to_string()));
        }
        Ok(self.state.lock().unwrap().users.get(user_id).cloned())
    }
}

pub fn role(id: &str, permissions: &[Permission]) -> Role {
    Role {
        id: RoleId(id.to_string()),
        name: id.to_lowercase().replace('_', " "),
        permissions: permissions.to_vec(),
        project_association_supported: true,
    }
}

pub fn group(key: &str) -> Group {
    Group {
        key: GroupKey(key.to_string()),
        name: key.to_lowercase(),
    }
}

/// A form for a join invitation with the given role.
pub fn join_form(name: &str, role_id: &str, multi: bool) -> InvitationForm {
    InvitationForm::new()
        .with(NAME_PARAM, name)
        .with(ROLE_PARAM, role_id)
        .with(MULTIUSER_PARAM, multi.to_string())
}

/// Everything a test needs: the fake host, a store, and a service over both.
pub struct Fixture {
    pub host: Arc<FakeHost>,
    pub store: Arc<MemoryInvitationStore>,
    pub service: Arc<InvitationService>,
    pub project: Scope,
    /// Holds PROJECT_ADMIN on `project`.
    pub admin: Principal,
}

impl Fixture {
    pub fn new() -> Self {
        let config = InvitationsConfig::default();
        let store = Arc::new(
            MemoryInvitationStore::new()
                .with_claim_timeout(Duration::seconds(config.claim_timeout_secs)),
        );
        Self::with_store(store.clone(), store)
    }

    pub fn with_store(
        store: Arc<MemoryInvitationStore>,
        service_store: Arc<dyn InvitationStore>,
    ) -> Self {
        let host = FakeHost::new();
        let project = host.add_scope("Proj1");
        let admin = host.add_user("admin");
        host.give_role(&admin, PROJECT_ADMIN, &project);

        let service = InvitationService::with_default_types(
            service_store,
            HostServices::from_single(host.clone()),
            InvitationsConfig::default(),
        )
        .unwrap();

        Self {
            host,
            store,
            service: Arc::new(service),
            project,
            admin,
        }
    }

    pub fn host_services(&self) -> HostServices {
        HostServices::from_single(self.host.clone())
    }

    /// Create a join invitation as the admin; returns its token.
    pub async fn invite(&self, role_id: &str, multi: bool) -> String {
        self.service
            .create_invitation(
                &self.admin,
                &self.project.id,
                JOIN_PROJECT_TYPE_ID,
                &join_form("Join Proj1", role_id, multi),
            )
            .await
            .unwrap()
            .token()
            .to_string()
    }
}

/// Route `tracing` output to the test harness when `RUST_LOG` asks for it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
