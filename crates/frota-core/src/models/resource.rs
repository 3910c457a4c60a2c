//! Resource domain model.
//!
//! A resource is one trackable physical asset: a vehicle, an equipment
//! item, or a material lot. Kind-specific attributes (vehicle documents,
//! material stock levels, serial numbers) live in `metadata`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vehicle,
    Equipment,
    Material,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Vehicle,
        ResourceKind::Equipment,
        ResourceKind::Material,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vehicle => "Vehicle",
            ResourceKind::Equipment => "Equipment",
            ResourceKind::Material => "Material",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub kind: ResourceKind,
    /// Plate number for vehicles, inventory code otherwise.
    pub code: String,
    pub description: String,
    /// Inactive resources cannot be newly assigned but can still be returned.
    pub active: bool,
    /// Cached assignment pointer. `None` means the resource is in the
    /// warehouse pool. Only the movement ledger moves it.
    pub current_site_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn is_assigned(&self) -> bool {
        self.current_site_id.is_some()
    }

    /// Numeric metadata field, accepting numbers or numeric strings.
    pub fn metadata_number(&self, field: &str) -> Option<f64> {
        match self.metadata.get(field)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Current material stock; absent or unreadable counts as zero.
    pub fn stock_current(&self) -> f64 {
        self.metadata_number(STOCK_CURRENT).unwrap_or(0.0)
    }
}

/// Metadata key holding a material's on-hand quantity.
pub const STOCK_CURRENT: &str = "stock_current";
/// Metadata key holding a material's reorder threshold.
pub const STOCK_MINIMUM: &str = "stock_minimum";

/// Fields required to register a new resource. New resources always start
/// in the warehouse pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub kind: ResourceKind,
    pub code: String,
    pub description: String,
    /// Defaults to `true`.
    pub active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields the CRUD layer may change. The assignment pointer is deliberately
/// absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateResource {
    pub code: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}
