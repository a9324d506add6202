use invitations_storage::{ScopeId, StoreError};
use thiserror::Error;

use crate::form::ActionErrors;
use crate::host::HostError;

/// Errors produced while creating, decoding, or redeeming invitations.
#[derive(Debug, Error)]
pub enum InvitationError {
    /// Submitted form failed validation; reported back to the form.
    #[error("invalid invitation properties: {0}")]
    Validation(ActionErrors),

    /// An invitation was built without the data its kind requires.
    #[error("invalid invitation: {0}")]
    ConstructionInvariant(String),

    /// The token resolves to nothing, or a single-use token was already consumed.
    #[error("invitation not available")]
    UnknownToken,

    #[error("not allowed to use this invitation")]
    Forbidden,

    /// The grant could not be applied at redemption time.
    #[error("{0}")]
    Grant(String),

    /// Some of the grant was applied before a later side effect failed.
    #[error("invitation partially applied: {0}")]
    PartialGrant(String),

    #[error("unknown invitation type: {0}")]
    UnknownType(String),

    #[error("invitation type {0} is already registered")]
    DuplicateType(String),

    #[error("unknown scope: {0}")]
    UnknownScope(ScopeId),

    #[error("malformed invitation record: {0}")]
    MalformedRecord(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}
