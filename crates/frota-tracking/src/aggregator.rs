//! Read-side views: what is on a site, where a resource is, and inventory
//! totals. Everything is read from the registry on demand.

use std::collections::HashMap;

use frota_core::error::FrotaResult;
use frota_core::models::resource::{Resource, ResourceKind};
use frota_core::models::site::{Site, SiteState};
use frota_core::repository::{ResourceRepository, SiteRepository};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resources currently at one site, grouped by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteResources {
    pub site: Site,
    pub vehicles: Vec<Resource>,
    pub equipment: Vec<Resource>,
    pub materials: Vec<Resource>,
}

impl SiteResources {
    pub fn total(&self) -> usize {
        self.vehicles.len() + self.equipment.len() + self.materials.len()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindSummary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub assigned: usize,
    pub in_pool: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySummary {
    pub by_kind: HashMap<ResourceKind, KindSummary>,
    pub sites_by_state: HashMap<SiteState, usize>,
    /// Sum of `stock_current` over all materials.
    pub material_stock: f64,
}

impl InventorySummary {
    pub fn kind(&self, kind: ResourceKind) -> KindSummary {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }

    pub fn sites_in(&self, state: SiteState) -> usize {
        self.sites_by_state.get(&state).copied().unwrap_or(0)
    }
}

pub struct SiteAggregator<R: ResourceRepository, S: SiteRepository> {
    resources: R,
    sites: S,
}

impl<R: ResourceRepository, S: SiteRepository> SiteAggregator<R, S> {
    pub fn new(resources: R, sites: S) -> Self {
        Self { resources, sites }
    }

    pub async fn resources_at_site(&self, site_id: Uuid) -> FrotaResult<SiteResources> {
        let site = self.sites.get_by_id(site_id).await?;
        let mut view = SiteResources {
            site,
            vehicles: Vec::new(),
            equipment: Vec::new(),
            materials: Vec::new(),
        };

        for resource in self.resources.list_by_site(site_id).await? {
            match resource.kind {
                ResourceKind::Vehicle => view.vehicles.push(resource),
                ResourceKind::Equipment => view.equipment.push(resource),
                ResourceKind::Material => view.materials.push(resource),
            }
        }
        Ok(view)
    }

    /// The site holding `resource_id`, or `None` while it is in the pool.
    pub async fn site_of(&self, resource_id: Uuid) -> FrotaResult<Option<Site>> {
        let resource = self.resources.get_by_id(resource_id).await?;
        match resource.current_site_id {
            Some(site_id) => Ok(Some(self.sites.get_by_id(site_id).await?)),
            None => Ok(None),
        }
    }

    pub async fn summary(&self) -> FrotaResult<InventorySummary> {
        let mut summary = InventorySummary::default();

        for kind in ResourceKind::ALL {
            let mut counts = KindSummary::default();
            for resource in self.resources.list_by_kind(kind).await? {
                counts.total += 1;
                if resource.active {
                    counts.active += 1;
                } else {
                    counts.inactive += 1;
                }
                if resource.is_assigned() {
                    counts.assigned += 1;
                } else {
                    counts.in_pool += 1;
                }
                if kind == ResourceKind::Material {
                    summary.material_stock += resource.stock_current();
                }
            }
            summary.by_kind.insert(kind, counts);
        }

        for state in SiteState::ALL {
            let sites = self.sites.list_by_state(state).await?;
            summary.sites_by_state.insert(state, sites.len());
        }

        Ok(summary)
    }
}
