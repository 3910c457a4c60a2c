//! Material stock movements.
//!
//! Every inbound delivery and outbound consumption of a material is an
//! immutable [`StockMovement`]. The material's `stock_current` metadata is
//! moved in the same storage transaction that appends the movement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StockDirection {
    /// Delivery into stock (supplier, purchase document).
    Inbound,
    /// Consumption or dispatch out of stock, usually to a site.
    Outbound,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Inbound => "Inbound",
            StockDirection::Outbound => "Outbound",
        }
    }

    /// Balance after moving `quantity` from `balance` in this direction.
    pub fn apply(&self, balance: f64, quantity: f64) -> f64 {
        match self {
            StockDirection::Inbound => balance + quantity,
            StockDirection::Outbound => balance - quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Uuid,
    pub material_id: Uuid,
    /// 1-based position in this material's stock history.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub direction: StockDirection,
    /// Always positive; the direction carries the sign.
    pub quantity: f64,
    /// Stock on hand once this movement was applied.
    pub balance_after: f64,
    pub site_id: Option<Uuid>,
    pub supplier: String,
    pub document: String,
    pub responsible: String,
    pub notes: Option<String>,
}

/// A validated stock movement ready to be appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStockMovement {
    pub material_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub direction: StockDirection,
    pub quantity: f64,
    pub balance_after: f64,
    pub site_id: Option<Uuid>,
    pub supplier: String,
    pub document: String,
    pub responsible: String,
    pub notes: Option<String>,
}
