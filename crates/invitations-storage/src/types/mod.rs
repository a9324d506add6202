//! Type definitions for invitation storage.

mod ids;
mod invitations;

// Re-export all types from submodules
pub use ids::*;
pub use invitations::*;
