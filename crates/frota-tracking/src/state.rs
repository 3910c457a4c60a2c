//! Assignment state machine.
//!
//! A resource is either in the warehouse pool or at exactly one site.
//! `Unassigned --assign--> Assigned(site)` and
//! `Assigned(site) --return--> Unassigned` are the only transitions; the
//! checks below decide whether a requested transition is allowed without
//! touching storage.

use frota_core::models::movement::{MovementEvent, replay_current_site};
use frota_core::models::resource::Resource;
use frota_core::models::site::Site;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentState {
    #[default]
    Unassigned,
    Assigned(Uuid),
}

impl AssignmentState {
    pub fn from_pointer(site_id: Option<Uuid>) -> Self {
        match site_id {
            Some(site_id) => AssignmentState::Assigned(site_id),
            None => AssignmentState::Unassigned,
        }
    }

    /// State derived from the ledger head, ignoring the registry cache.
    pub fn from_latest(latest: Option<&MovementEvent>) -> Self {
        Self::from_pointer(replay_current_site(latest))
    }

    pub fn site_id(&self) -> Option<Uuid> {
        match self {
            AssignmentState::Assigned(site_id) => Some(*site_id),
            AssignmentState::Unassigned => None,
        }
    }
}

/// Decide whether `resource` may be assigned to `site`.
///
/// Checked in order: already at a site, inactive, site not accepting.
pub fn check_assign(
    state: AssignmentState,
    resource: &Resource,
    site: &Site,
) -> Result<(), TransitionError> {
    if let AssignmentState::Assigned(site_id) = state {
        return Err(TransitionError::AlreadyAssigned {
            resource_id: resource.id,
            site_id,
        });
    }
    if !resource.active {
        return Err(TransitionError::ResourceInactive {
            resource_id: resource.id,
        });
    }
    if !site.state.accepts_assignments() {
        return Err(TransitionError::SiteNotEligible {
            site_id: site.id,
            state: site.state,
        });
    }
    Ok(())
}

/// Decide whether `resource` may be returned, yielding the site it leaves.
/// Inactive resources can always come back.
pub fn check_return(state: AssignmentState, resource: &Resource) -> Result<Uuid, TransitionError> {
    state.site_id().ok_or(TransitionError::NotAssigned {
        resource_id: resource.id,
    })
}
