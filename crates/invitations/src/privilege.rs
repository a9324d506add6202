//! Who a host call is made on behalf of.
//!
//! Host queries and side effects take an [`Authority`]: either the calling
//! principal at its own privilege, or the system. A system authority can only
//! be obtained from a live [`Elevation`] and cannot outlive it, so escalation is
//! confined to the block holding the guard and ends on every exit path.

use std::marker::PhantomData;

use invitations_storage::UserId;

use crate::host::Principal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authority<'a>(Kind<'a>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind<'a> {
    Caller(&'a UserId),
    System(PhantomData<&'a Elevation>),
}

impl<'a> Authority<'a> {
    /// Act with exactly the privileges `principal` holds.
    pub fn caller(principal: &'a Principal) -> Self {
        Self(Kind::Caller(&principal.id))
    }

    pub fn is_system(&self) -> bool {
        matches!(self.0, Kind::System(_))
    }

    /// The acting user, `None` under system privilege.
    pub fn caller_id(&self) -> Option<&'a UserId> {
        match self.0 {
            Kind::Caller(id) => Some(id),
            Kind::System(_) => None,
        }
    }
}

/// Scoped system privilege.
#[derive(Debug)]
pub struct Elevation {
    reason: &'static str,
}

impl Elevation {
    pub fn enter(reason: &'static str) -> Self {
        tracing::debug!(reason, "entering system privilege");
        Self { reason }
    }

    pub fn authority(&self) -> Authority<'_> {
        Authority(Kind::System(PhantomData))
    }
}

impl Drop for Elevation {
    fn drop(&mut self) {
        tracing::trace!(reason = self.reason, "leaving system privilege");
    }
}
