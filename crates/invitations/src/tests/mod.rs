//! Invitation core tests.
//!
//! - `common` - Fake host platform and fixture helpers
//! - `join_project` - Join-project type behavior against the fake host
//! - `redemption` - Token redemption, authorization and consumption
//! - `service` - Creating, listing and revoking through the service

pub mod common;
