//! The invitation entity and its flat record form.

use invitations_storage::{GroupKey, InvitationRecord, RoleId, UserId};
use uuid::Uuid;

use crate::error::InvitationError;
use crate::host::Scope;

pub const TOKEN_KEY: &str = "token";
pub const MULTI_KEY: &str = "multi";
pub const NAME_KEY: &str = "name";
pub const WELCOME_TEXT_KEY: &str = "welcomeText";
pub const CREATED_BY_KEY: &str = "createdBy";
pub const ROLE_ID_KEY: &str = "roleId";
pub const GROUP_KEY_KEY: &str = "groupKey";

/// Attributes every invitation kind shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvitationBase {
    pub token: String,
    pub multi: bool,
    pub name: String,
    pub welcome_text: String,
    pub created_by: UserId,
}

impl InvitationBase {
    pub fn write_to(&self, record: &mut InvitationRecord) {
        record.insert(TOKEN_KEY, self.token.as_str());
        record.insert(MULTI_KEY, self.multi.to_string());
        record.insert(NAME_KEY, self.name.as_str());
        record.insert(WELCOME_TEXT_KEY, self.welcome_text.as_str());
        record.insert(CREATED_BY_KEY, self.created_by.to_string());
    }

    pub fn read_from(record: &InvitationRecord) -> Result<Self, InvitationError> {
        let token = record
            .get(TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| InvitationError::MalformedRecord("missing token".to_string()))?;
        let created_by = record
            .get(CREATED_BY_KEY)
            .ok_or_else(|| InvitationError::MalformedRecord("missing createdBy".to_string()))?;
        let created_by = Uuid::parse_str(created_by).map_err(|e| {
            InvitationError::MalformedRecord(format!("invalid createdBy '{created_by}': {e}"))
        })?;

        Ok(Self {
            token: token.to_string(),
            multi: record
                .get(MULTI_KEY)
                .is_some_and(|m| m.eq_ignore_ascii_case("true")),
            name: record.get(NAME_KEY).unwrap_or_default().to_string(),
            welcome_text: record.get(WELCOME_TEXT_KEY).unwrap_or_default().to_string(),
            created_by: UserId(created_by),
        })
    }
}

/// What joining a project grants: a role in the project, a group, or both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinProjectGrant {
    role_id: Option<RoleId>,
    group_key: Option<GroupKey>,
}

impl JoinProjectGrant {
    /// Fails unless at least one of `role_id` and `group_key` is present.
    pub fn new(
        role_id: Option<RoleId>,
        group_key: Option<GroupKey>,
    ) -> Result<Self, InvitationError> {
        if role_id.is_none() && group_key.is_none() {
            return Err(InvitationError::ConstructionInvariant(
                "Role or group must be specified".to_string(),
            ));
        }
        Ok(Self { role_id, group_key })
    }

    pub fn role_id(&self) -> Option<&RoleId> {
        self.role_id.as_ref()
    }

    pub fn group_key(&self) -> Option<&GroupKey> {
        self.group_key.as_ref()
    }

    fn write_to(&self, record: &mut InvitationRecord) {
        if let Some(role_id) = &self.role_id {
            record.insert(ROLE_ID_KEY, role_id.0.as_str());
        }
        if let Some(group_key) = &self.group_key {
            record.insert(GROUP_KEY_KEY, group_key.0.as_str());
        }
    }

    pub fn read_from(record: &InvitationRecord) -> Result<Self, InvitationError> {
        Self::new(
            record.get(ROLE_ID_KEY).map(|r| RoleId(r.to_string())),
            record.get(GROUP_KEY_KEY).map(|g| GroupKey(g.to_string())),
        )
        .map_err(|e| InvitationError::MalformedRecord(e.to_string()))
    }
}

/// Kind-specific data carried by an invitation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvitationPayload {
    JoinProject(JoinProjectGrant),
}

impl InvitationPayload {
    fn write_to(&self, record: &mut InvitationRecord) {
        match self {
            InvitationPayload::JoinProject(grant) => grant.write_to(record),
        }
    }
}

/// An issued invitation. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invitation {
    base: InvitationBase,
    type_id: &'static str,
    scope: Scope,
    payload: InvitationPayload,
}

impl Invitation {
    pub fn new(
        base: InvitationBase,
        type_id: &'static str,
        scope: Scope,
        payload: InvitationPayload,
    ) -> Self {
        Self {
            base,
            type_id,
            scope,
            payload,
        }
    }

    pub fn token(&self) -> &str {
        &self.base.token
    }

    pub fn is_multi(&self) -> bool {
        self.base.multi
    }

    /// Always the negation of the `multi` flag.
    pub fn is_reusable(&self) -> bool {
        !self.base.multi
    }

    /// Id of the invitation type this invitation belongs to.
    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn welcome_text(&self) -> &str {
        &self.base.welcome_text
    }

    pub fn created_by(&self) -> &UserId {
        &self.base.created_by
    }

    pub fn payload(&self) -> &InvitationPayload {
        &self.payload
    }

    pub fn join_project(&self) -> Option<&JoinProjectGrant> {
        match &self.payload {
            InvitationPayload::JoinProject(grant) => Some(grant),
        }
    }

    pub fn write_to(&self, record: &mut InvitationRecord) {
        self.base.write_to(record);
        self.payload.write_to(record);
    }

    pub fn to_record(&self) -> InvitationRecord {
        let mut record = InvitationRecord::new();
        self.write_to(&mut record);
        record
    }
}
