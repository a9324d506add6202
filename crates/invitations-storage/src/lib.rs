//! Storage abstraction for invitations.
//!
//! Backend crates (e.g., invitations-store-memory, invitations-store-sqlite) implement
//! [`InvitationStore`] so the `invitations` core doesn't depend on any specific
//! database engine or schema details.

mod store;
mod types;

pub use store::*;
pub use types::*;

use thiserror::Error;

/// Seconds after which an uncompleted claim is treated as abandoned.
pub const DEFAULT_CLAIM_TIMEOUT_SECS: i64 = 300;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
