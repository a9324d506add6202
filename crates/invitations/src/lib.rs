//! Token-bearing invitations for a hosting platform.
//!
//! An invitation is a stored record keyed by an unguessable token. Whoever
//! presents the token is granted what the invitation carries: for the built-in
//! [`JoinProjectInvitationType`], a role in a project, a group membership, or
//! both. Invitation types are pluggable through [`InvitationType`] and looked
//! up in an [`InvitationRegistry`].
//!
//! The platform's projects, roles, groups and users stay behind the traits in
//! [`host`]. Grants run under a scoped [`Elevation`] so a redeemer never needs
//! the privileges the invitation confers.

pub mod config;
pub mod error;
pub mod form;
pub mod host;
pub mod invitation;
pub mod join_project;
pub mod kind;
pub mod navigation;
pub mod privilege;
pub mod redemption;
pub mod registry;
pub mod service;
pub mod token;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, InvitationsConfig};
pub use error::InvitationError;
pub use form::{ActionErrors, InvalidProperty, InvitationForm};
pub use host::{
    Group, HostError, HostServices, Permission, Principal, Role, RoleGroupRegistry, Scope,
    ScopeRegistry, UserRegistry,
};
pub use invitation::{Invitation, InvitationBase, InvitationPayload, JoinProjectGrant};
pub use join_project::{JoinProjectInvitationType, JOIN_PROJECT_TYPE_ID};
pub use kind::{EditPropertiesView, InvitationType};
pub use navigation::Navigation;
pub use privilege::{Authority, Elevation};
pub use redemption::{Redemption, RedemptionFlow, RedemptionState};
pub use registry::{InvitationRegistry, ResolvedInvitation};
pub use service::InvitationService;
pub use token::mint_token;
