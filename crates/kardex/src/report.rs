use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{DomainResult, MovementId, MovementReference, SupplyItemId, UserId};
use despensa_ledger::{Direction, Movement, StockClassification, SupplyItem};

/// Read capability consumed by the Kardex Reporter.
pub trait KardexStore: Send + Sync {
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem>;

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>>;

    /// Movements of one item within `[from, to]` (both bounds inclusive,
    /// either open), in unspecified order.
    fn movements_for_item(
        &self,
        item: SupplyItemId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<Movement>>;
}

impl<S> KardexStore for Arc<S>
where
    S: KardexStore + ?Sized,
{
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem> {
        (**self).supply_item(id)
    }

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>> {
        (**self).supply_items()
    }

    fn movements_for_item(
        &self,
        item: SupplyItemId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<Movement>> {
        (**self).movements_for_item(item, from, to)
    }
}

/// One kardex row: a movement annotated with the running balance after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KardexEntry {
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
    pub direction: Direction,
    pub reference: MovementReference,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub running_balance: Decimal,
    pub actor: UserId,
    pub note: Option<String>,
}

/// Lazy, chronologically ordered kardex sequence.
///
/// Movements are sorted by `(occurred_at, movement_id)` once up front; the
/// balance is accumulated as the iterator is driven. Re-querying the reporter
/// yields the same sequence for the same committed data.
pub struct KardexLedger {
    movements: std::vec::IntoIter<Movement>,
    balance: Decimal,
}

impl KardexLedger {
    pub fn from_movements(mut movements: Vec<Movement>) -> Self {
        movements.sort_by_key(|m| (m.occurred_at, m.id));
        Self {
            movements: movements.into_iter(),
            balance: Decimal::ZERO,
        }
    }
}

impl Iterator for KardexLedger {
    type Item = KardexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let movement = self.movements.next()?;
        self.balance += movement.signed_quantity();
        Some(KardexEntry {
            movement_id: movement.id,
            occurred_at: movement.occurred_at,
            direction: movement.direction,
            reference: movement.reference,
            quantity: movement.quantity,
            unit_cost: movement.unit_cost,
            total_cost: movement.total_cost,
            running_balance: self.balance,
            actor: movement.actor,
            note: movement.note,
        })
    }
}

/// Reporting row for one item's stock against its thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockStatus {
    pub item_id: SupplyItemId,
    pub name: String,
    pub classification: StockClassification,
    pub stock_actual: Decimal,
    pub below_minimum: bool,
    pub above_maximum: bool,
}

/// Read-only kardex and stock-status reporter.
pub struct KardexReporter<S> {
    store: S,
}

impl<S> KardexReporter<S>
where
    S: KardexStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The kardex of one item, optionally bounded to `[from, to]`.
    ///
    /// The running balance replays from the earliest movement in scope, so a
    /// bounded query starts its balance at zero within the window.
    pub fn ledger(
        &self,
        item: SupplyItemId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<KardexLedger> {
        self.store.supply_item(item)?;
        let movements = self.store.movements_for_item(item, from, to)?;
        Ok(KardexLedger::from_movements(movements))
    }

    /// Collected kardex rows (convenience over [`Self::ledger`]).
    pub fn entries(
        &self,
        item: SupplyItemId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<KardexEntry>> {
        Ok(self.ledger(item, from, to)?.collect())
    }

    /// Threshold report for one item, derived from the full movement log.
    pub fn stock_status(&self, item: SupplyItemId) -> DomainResult<StockStatus> {
        let item = self.store.supply_item(item)?;
        let stock_actual = self
            .store
            .movements_for_item(item.id, None, None)?
            .iter()
            .map(Movement::signed_quantity)
            .sum();
        Ok(status_for(&item, stock_actual))
    }

    /// Threshold report for every active item.
    pub fn stock_overview(&self) -> DomainResult<Vec<StockStatus>> {
        let mut rows = Vec::new();
        for item in self.store.supply_items()? {
            if !item.active {
                continue;
            }
            let stock_actual = self
                .store
                .movements_for_item(item.id, None, None)?
                .iter()
                .map(Movement::signed_quantity)
                .sum();
            rows.push(status_for(&item, stock_actual));
        }
        rows.sort_by_key(|r| r.item_id);
        Ok(rows)
    }
}

fn status_for(item: &SupplyItem, stock_actual: Decimal) -> StockStatus {
    StockStatus {
        item_id: item.id,
        name: item.name.clone(),
        classification: item.classification,
        stock_actual,
        below_minimum: item.below_minimum(stock_actual),
        above_maximum: item.above_maximum(stock_actual),
    }
}
