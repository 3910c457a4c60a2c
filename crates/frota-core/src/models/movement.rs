//! Movement ledger domain model.
//!
//! Every assignment of a resource to a site and every return to the
//! warehouse pool is recorded as an immutable [`MovementEvent`]. The
//! ledger is append-only and is the source of truth for where a resource
//! is; the registry's `current_site_id` is a cache of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::ResourceKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Movement {
    /// Resource checked out of the pool to a site.
    Assign {
        site_id: Uuid,
        handed_over_by: String,
    },
    /// Resource checked back into the pool from `site_id`.
    Return { site_id: Uuid, received_by: String },
}

impl Movement {
    pub fn site_id(&self) -> Uuid {
        match self {
            Movement::Assign { site_id, .. } | Movement::Return { site_id, .. } => *site_id,
        }
    }

    pub fn is_assign(&self) -> bool {
        matches!(self, Movement::Assign { .. })
    }

    /// The assignment pointer this movement leaves behind.
    pub fn resulting_site(&self) -> Option<Uuid> {
        match self {
            Movement::Assign { site_id, .. } => Some(*site_id),
            Movement::Return { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementEvent {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub resource_kind: ResourceKind,
    /// 1-based position in this resource's history.
    pub sequence: u64,
    /// Non-decreasing per resource.
    pub timestamp: DateTime<Utc>,
    pub movement: Movement,
    pub notes: Option<String>,
}

/// A fully-formed event ready to be appended. The tracking service fills in
/// `sequence` and `timestamp` while holding the resource lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub resource_id: Uuid,
    pub resource_kind: ResourceKind,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub movement: Movement,
    pub notes: Option<String>,
}

/// Recovery rule: the assignment pointer equals the site of the latest
/// event if that event is an assign, otherwise the resource is in the pool.
pub fn replay_current_site<'a, I>(history: I) -> Option<Uuid>
where
    I: IntoIterator<Item = &'a MovementEvent>,
{
    history
        .into_iter()
        .max_by_key(|e| e.sequence)
        .and_then(|e| e.movement.resulting_site())
}
