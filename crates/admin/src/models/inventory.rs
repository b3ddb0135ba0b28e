//! Inventory items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agencia_check_core::{Money, ProductId};

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Reorder threshold.
    pub min_quantity: u32,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// At or below the reorder threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }

    /// Stock valued at cost.
    #[must_use]
    pub fn stock_value(&self) -> Money {
        self.unit_cost.times(self.quantity)
    }
}

/// Input for adding an inventory item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInventoryItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub min_quantity: u32,
    pub unit_price: Money,
    pub unit_cost: Money,
}

/// Stock adjustment request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StockAdjustment {
    /// Positive to add stock, negative to remove.
    pub delta: i64,
}
