//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The tracking crate is generic over
//! these traits so it has no dependency on the database crate.

use uuid::Uuid;

use crate::error::FrotaResult;
use crate::models::{
    movement::{MovementEvent, NewMovement},
    resource::{CreateResource, Resource, ResourceKind, UpdateResource},
    site::{CreateSite, Site, SiteState, UpdateSite},
    stock::{NewStockMovement, StockMovement},
    trip::{CreateVehicleTrip, VehicleTrip},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Resource registry
// ---------------------------------------------------------------------------

pub trait ResourceRepository: Send + Sync {
    fn create(&self, input: CreateResource) -> impl Future<Output = FrotaResult<Resource>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FrotaResult<Resource>> + Send;
    /// Update CRUD-owned fields. Never touches `current_site_id`.
    fn update(
        &self,
        id: Uuid,
        input: UpdateResource,
    ) -> impl Future<Output = FrotaResult<Resource>> + Send;
    /// Delete an unassigned resource. Fails with `AlreadyAssigned` while the
    /// resource is checked out to a site.
    fn delete(&self, id: Uuid) -> impl Future<Output = FrotaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FrotaResult<PaginatedResult<Resource>>> + Send;
    fn list_by_kind(
        &self,
        kind: ResourceKind,
    ) -> impl Future<Output = FrotaResult<Vec<Resource>>> + Send;
    /// Every resource whose cached pointer equals `site_id`.
    fn list_by_site(
        &self,
        site_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Vec<Resource>>> + Send;
    /// Overwrite the cached assignment pointer.
    ///
    /// Only reconciliation calls this; regular transitions move the pointer
    /// inside [`MovementLedger::append`].
    fn set_assignment(
        &self,
        id: Uuid,
        site_id: Option<Uuid>,
    ) -> impl Future<Output = FrotaResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

pub trait SiteRepository: Send + Sync {
    fn create(&self, input: CreateSite) -> impl Future<Output = FrotaResult<Site>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FrotaResult<Site>> + Send;
    /// State changes never evict resources already on the site.
    fn update(&self, id: Uuid, input: UpdateSite) -> impl Future<Output = FrotaResult<Site>> + Send;
    /// Delete a site. Fails with `Validation` while resources are still
    /// assigned to it.
    fn delete(&self, id: Uuid) -> impl Future<Output = FrotaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FrotaResult<PaginatedResult<Site>>> + Send;
    fn list_by_state(&self, state: SiteState)
    -> impl Future<Output = FrotaResult<Vec<Site>>> + Send;
}

// ---------------------------------------------------------------------------
// Movement ledger (append-only)
// ---------------------------------------------------------------------------

pub trait MovementLedger: Send + Sync {
    /// Append a movement and move the resource's cached pointer to
    /// [`Movement::resulting_site`](crate::models::movement::Movement::resulting_site)
    /// as one atomic unit. No business validation happens here.
    fn append(
        &self,
        input: NewMovement,
    ) -> impl Future<Output = FrotaResult<MovementEvent>> + Send;
    /// All events for one resource, oldest first.
    fn history(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Vec<MovementEvent>>> + Send;
    /// The newest event for one resource, if any.
    fn latest(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Option<MovementEvent>>> + Send;
    /// Events referencing a site, newest first.
    fn list_by_site(
        &self,
        site_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = FrotaResult<PaginatedResult<MovementEvent>>> + Send;
}

// ---------------------------------------------------------------------------
// Stock ledger (append-only)
// ---------------------------------------------------------------------------

pub trait StockLedger: Send + Sync {
    /// Append a stock movement and set the material's `stock_current` to
    /// its `balance_after` as one atomic unit. Fails with `NotFound` when
    /// the material is gone.
    fn record(
        &self,
        input: NewStockMovement,
    ) -> impl Future<Output = FrotaResult<StockMovement>> + Send;
    /// All movements for one material, oldest first.
    fn history(
        &self,
        material_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Vec<StockMovement>>> + Send;
    fn latest(
        &self,
        material_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Option<StockMovement>>> + Send;
    /// Movements tagged with a site, newest first.
    fn list_by_site(
        &self,
        site_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = FrotaResult<PaginatedResult<StockMovement>>> + Send;
}

// ---------------------------------------------------------------------------
// Vehicle trips
// ---------------------------------------------------------------------------

pub trait TripLog: Send + Sync {
    fn create(
        &self,
        input: CreateVehicleTrip,
    ) -> impl Future<Output = FrotaResult<VehicleTrip>> + Send;
    /// Trips of one vehicle, newest trip date first.
    fn list_by_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> impl Future<Output = FrotaResult<Vec<VehicleTrip>>> + Send;
    fn list_by_site(&self, site_id: Uuid)
    -> impl Future<Output = FrotaResult<Vec<VehicleTrip>>> + Send;
}
