//! Material stock movements: deliveries in, consumption out.

use std::sync::Arc;

use chrono::Utc;
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::resource::{Resource, ResourceKind};
use frota_core::models::stock::{NewStockMovement, StockDirection, StockMovement};
use frota_core::repository::{
    PaginatedResult, Pagination, ResourceRepository, SiteRepository, StockLedger,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::locks::ResourceLocks;

/// Request to move material stock in or out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInput {
    pub material_id: Uuid,
    pub direction: StockDirection,
    pub quantity: f64,
    /// Site receiving (outbound) or supplying (inbound) the material.
    #[serde(default)]
    pub site_id: Option<Uuid>,
    #[serde(default)]
    pub supplier: String,
    /// Delivery note, invoice or requisition number.
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct StockService<R: ResourceRepository, S: SiteRepository, K: StockLedger> {
    resources: R,
    sites: S,
    ledger: K,
    locks: Arc<ResourceLocks>,
}

impl<R: ResourceRepository, S: SiteRepository, K: StockLedger> StockService<R, S, K> {
    pub fn new(resources: R, sites: S, ledger: K, locks: Arc<ResourceLocks>) -> Self {
        Self {
            resources,
            sites,
            ledger,
            locks,
        }
    }

    /// Append a stock movement and move the material's `stock_current`.
    /// Outbound movements never take stock below zero.
    pub async fn record(&self, input: StockInput) -> FrotaResult<StockMovement> {
        if !input.quantity.is_finite() || input.quantity <= 0.0 {
            return Err(FrotaError::Validation {
                message: format!("quantity must be positive, got {}", input.quantity),
            });
        }

        let _guard = self.locks.acquire(input.material_id).await;

        let material = self.load_material(input.material_id).await?;
        if let Some(site_id) = input.site_id {
            self.sites.get_by_id(site_id).await?;
        }

        let available = material.stock_current();
        let balance_after = input.direction.apply(available, input.quantity);
        if balance_after < 0.0 {
            return Err(FrotaError::InsufficientStock {
                material_id: material.id,
                available,
                requested: input.quantity,
            });
        }

        let now = Utc::now();
        let (sequence, timestamp) = match self.ledger.latest(material.id).await? {
            Some(prev) => (prev.sequence + 1, now.max(prev.timestamp)),
            None => (1, now),
        };

        let movement = self
            .ledger
            .record(NewStockMovement {
                material_id: material.id,
                sequence,
                timestamp,
                direction: input.direction,
                quantity: input.quantity,
                balance_after,
                site_id: input.site_id,
                supplier: input.supplier.trim().to_string(),
                document: input.document.trim().to_string(),
                responsible: input.responsible.trim().to_string(),
                notes: input
                    .notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            })
            .await?;

        info!(
            material_id = %material.id,
            direction = input.direction.as_str(),
            quantity = input.quantity,
            balance_after,
            "Stock moved"
        );
        Ok(movement)
    }

    /// Stock movements of one material, oldest first.
    pub async fn history(&self, material_id: Uuid) -> FrotaResult<Vec<StockMovement>> {
        self.load_material(material_id).await?;
        self.ledger.history(material_id).await
    }

    /// Stock movements tagged with a site, newest first.
    pub async fn site_log(
        &self,
        site_id: Uuid,
        pagination: Pagination,
    ) -> FrotaResult<PaginatedResult<StockMovement>> {
        self.sites.get_by_id(site_id).await?;
        self.ledger.list_by_site(site_id, pagination).await
    }

    async fn load_material(&self, id: Uuid) -> FrotaResult<Resource> {
        let resource = self.resources.get_by_id(id).await?;
        if resource.kind != ResourceKind::Material {
            return Err(FrotaError::not_found("material", id));
        }
        Ok(resource)
    }
}
