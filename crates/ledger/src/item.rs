use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{DomainError, DomainResult, Entity, LotId, SupplyItemId};

/// Reporting classification derived from an item's category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockClassification {
    /// Counted stock that persists across service periods (dry goods, bottles).
    Perpetual,
    /// Stock consumed within the operating cycle (fresh produce, prepared items).
    Operational,
}

/// A trackable raw material or ingredient (`insumo`).
///
/// `stock_actual` is never stored here; it is always derived as the sum of the
/// item's lots' current quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyItem {
    pub id: SupplyItemId,
    pub name: String,
    /// Base unit of measure, e.g. `"kg"`, `"lt"`, `"unidad"`.
    pub unit: String,
    /// Free-form category, e.g. `"carnes"`, `"abarrotes"`.
    pub category: String,
    pub classification: StockClassification,
    pub min_stock: Decimal,
    pub max_stock: Decimal,
    /// Running weighted-average unit cost, recomputed on every entry.
    pub avg_unit_cost: Decimal,
    pub active: bool,
}

impl SupplyItem {
    pub fn below_minimum(&self, stock: Decimal) -> bool {
        stock < self.min_stock
    }

    pub fn above_maximum(&self, stock: Decimal) -> bool {
        self.max_stock > Decimal::ZERO && stock > self.max_stock
    }
}

impl Entity for SupplyItem {
    type Id = SupplyItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A batch of a supply item with its own quantity, cost, and expiration.
///
/// Invariant: `0 <= current_quantity <= initial_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub item_id: SupplyItemId,
    pub initial_quantity: Decimal,
    pub current_quantity: Decimal,
    /// Unit cost at acquisition.
    pub unit_cost: Decimal,
    pub expiration: Option<NaiveDate>,
    pub location: Option<String>,
    /// Row version for optimistic compare-and-set on quantity updates.
    pub version: u64,
}

impl Lot {
    pub fn available(&self) -> Decimal {
        self.current_quantity
    }

    /// Validate the lot quantity invariant.
    pub fn check_quantities(&self) -> DomainResult<()> {
        if self.current_quantity < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "lot {} current quantity cannot be negative",
                self.id
            )));
        }
        if self.current_quantity > self.initial_quantity {
            return Err(DomainError::validation(format!(
                "lot {} current quantity cannot exceed initial quantity",
                self.id
            )));
        }
        Ok(())
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Attributes describing the batch a goods receipt materializes.
///
/// A line whose attributes match an existing lot (same expiration, location,
/// and unit cost) augments that lot; any difference means a new batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLotAttributes {
    pub expiration: Option<NaiveDate>,
    pub location: Option<String>,
}
