//! Assignment service: the only path that moves resources between the
//! warehouse pool and construction sites.

use std::sync::Arc;

use chrono::Utc;
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::movement::{Movement, MovementEvent, NewMovement, replay_current_site};
use frota_core::models::resource::{Resource, ResourceKind};
use frota_core::repository::{MovementLedger, ResourceRepository, SiteRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::locks::ResourceLocks;
use crate::state::{self, AssignmentState};

/// Request to check a resource out of the pool to a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignInput {
    pub resource_id: Uuid,
    pub resource_kind: ResourceKind,
    pub site_id: Uuid,
    /// Person handing the resource over. May be empty.
    #[serde(default)]
    pub handed_over_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request to check a resource back into the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnInput {
    pub resource_id: Uuid,
    pub resource_kind: ResourceKind,
    /// Person receiving the resource. May be empty.
    #[serde(default)]
    pub received_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A resource whose cached pointer disagreed with its ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Drift {
    pub resource_id: Uuid,
    pub cached: Option<Uuid>,
    pub ledger: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub drifts: Vec<Drift>,
    /// `false` for a read-only verification pass.
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Assignment service.
///
/// Generic over repository implementations so that the tracking layer
/// has no dependency on the database crate.
pub struct AssignmentService<R: ResourceRepository, S: SiteRepository, L: MovementLedger> {
    resources: R,
    sites: S,
    ledger: L,
    locks: Arc<ResourceLocks>,
}

impl<R: ResourceRepository, S: SiteRepository, L: MovementLedger> AssignmentService<R, S, L> {
    pub fn new(resources: R, sites: S, ledger: L) -> Self {
        Self::with_locks(resources, sites, ledger, Arc::new(ResourceLocks::new()))
    }

    /// Share per-resource locks with other services writing the same
    /// resources (stock movements).
    pub fn with_locks(resources: R, sites: S, ledger: L, locks: Arc<ResourceLocks>) -> Self {
        Self {
            resources,
            sites,
            ledger,
            locks,
        }
    }

    pub fn locks(&self) -> Arc<ResourceLocks> {
        Arc::clone(&self.locks)
    }

    /// Assign a pooled, active resource to an active site.
    ///
    /// The append writes the site record, so assigns racing each other or a
    /// site delete on the same site may fail with a retryable `Storage` error.
    pub async fn assign(&self, input: AssignInput) -> FrotaResult<MovementEvent> {
        let _guard = self.locks.acquire(input.resource_id).await;

        let resource = self
            .load_resource(input.resource_id, input.resource_kind)
            .await?;
        let site = self.sites.get_by_id(input.site_id).await?;
        let latest = self.ledger.latest(resource.id).await?;
        let current = self.ledger_state(&resource, latest.as_ref());

        state::check_assign(current, &resource, &site)?;

        let event = self
            .append(
                &resource,
                latest,
                Movement::Assign {
                    site_id: site.id,
                    handed_over_by: input.handed_over_by.trim().to_string(),
                },
                input.notes,
            )
            .await?;

        info!(
            resource_id = %resource.id,
            kind = %resource.kind,
            site_id = %site.id,
            sequence = event.sequence,
            "Resource assigned"
        );
        Ok(event)
    }

    /// Return an assigned resource to the pool. Works for inactive
    /// resources and for sites that are paused or completed.
    pub async fn return_resource(&self, input: ReturnInput) -> FrotaResult<MovementEvent> {
        let _guard = self.locks.acquire(input.resource_id).await;

        let resource = self
            .load_resource(input.resource_id, input.resource_kind)
            .await?;
        let latest = self.ledger.latest(resource.id).await?;
        let current = self.ledger_state(&resource, latest.as_ref());

        let site_id = state::check_return(current, &resource)?;

        let event = self
            .append(
                &resource,
                latest,
                Movement::Return {
                    site_id,
                    received_by: input.received_by.trim().to_string(),
                },
                input.notes,
            )
            .await?;

        info!(
            resource_id = %resource.id,
            kind = %resource.kind,
            site_id = %site_id,
            sequence = event.sequence,
            "Resource returned"
        );
        Ok(event)
    }

    /// Full movement history of a resource, oldest first.
    pub async fn history(&self, resource_id: Uuid) -> FrotaResult<Vec<MovementEvent>> {
        self.resources.get_by_id(resource_id).await?;
        self.ledger.history(resource_id).await
    }

    /// The site currently holding the resource, or `None` when pooled.
    pub async fn current_site(&self, resource_id: Uuid) -> FrotaResult<Option<Uuid>> {
        Ok(self.resources.get_by_id(resource_id).await?.current_site_id)
    }

    /// Rebuild one resource's pointer from its ledger, repairing the
    /// registry if they disagree.
    pub async fn reconcile(&self, resource_id: Uuid) -> FrotaResult<Option<Drift>> {
        let _guard = self.locks.acquire(resource_id).await;
        self.check_one(resource_id, true).await
    }

    /// Reconcile every resource in the registry.
    pub async fn reconcile_all(&self) -> FrotaResult<ReconcileReport> {
        self.check_all(true).await
    }

    /// Like [`reconcile_all`](Self::reconcile_all) but never writes.
    pub async fn verify_consistency(&self) -> FrotaResult<ReconcileReport> {
        self.check_all(false).await
    }

    async fn check_all(&self, repair: bool) -> FrotaResult<ReconcileReport> {
        let mut report = ReconcileReport {
            repaired: repair,
            ..Default::default()
        };

        for kind in ResourceKind::ALL {
            for resource in self.resources.list_by_kind(kind).await? {
                let _guard = self.locks.acquire(resource.id).await;
                match self.check_one(resource.id, repair).await {
                    Ok(Some(drift)) => report.drifts.push(drift),
                    Ok(None) => {}
                    // Deleted since it was listed.
                    Err(FrotaError::NotFound { .. }) => continue,
                    Err(e) => return Err(e),
                }
                report.checked += 1;
            }
        }

        info!(
            checked = report.checked,
            drifts = report.drifts.len(),
            repaired = report.repaired,
            "Ledger consistency pass finished"
        );
        Ok(report)
    }

    /// Caller must hold the resource lock.
    async fn check_one(&self, resource_id: Uuid, repair: bool) -> FrotaResult<Option<Drift>> {
        let resource = self.resources.get_by_id(resource_id).await?;
        let history = self.ledger.history(resource_id).await?;
        let expected = replay_current_site(&history);

        if expected == resource.current_site_id {
            return Ok(None);
        }

        warn!(
            resource_id = %resource_id,
            cached = ?resource.current_site_id,
            ledger = ?expected,
            repair,
            "Assignment pointer drifted from ledger"
        );

        if repair {
            self.resources.set_assignment(resource_id, expected).await?;
        }

        Ok(Some(Drift {
            resource_id,
            cached: resource.current_site_id,
            ledger: expected,
        }))
    }

    /// Fetch a resource, treating a kind mismatch as unknown.
    async fn load_resource(&self, id: Uuid, kind: ResourceKind) -> FrotaResult<Resource> {
        let resource = self.resources.get_by_id(id).await?;
        if resource.kind != kind {
            return Err(FrotaError::not_found(kind.as_str(), id));
        }
        Ok(resource)
    }

    fn ledger_state(&self, resource: &Resource, latest: Option<&MovementEvent>) -> AssignmentState {
        let state = AssignmentState::from_latest(latest);
        if state.site_id() != resource.current_site_id {
            warn!(
                resource_id = %resource.id,
                cached = ?resource.current_site_id,
                ledger = ?state.site_id(),
                "Registry pointer disagrees with ledger; trusting ledger"
            );
        }
        state
    }

    async fn append(
        &self,
        resource: &Resource,
        latest: Option<MovementEvent>,
        movement: Movement,
        notes: Option<String>,
    ) -> FrotaResult<MovementEvent> {
        let now = Utc::now();
        let (sequence, timestamp) = match latest {
            Some(prev) => (prev.sequence + 1, now.max(prev.timestamp)),
            None => (1, now),
        };

        self.ledger
            .append(NewMovement {
                resource_id: resource.id,
                resource_kind: resource.kind,
                sequence,
                timestamp,
                movement,
                notes: notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            })
            .await
    }
}
