//! The Lot & Ledger Manager.
//!
//! Sole owner of lot quantity state, item weighted-average cost, and movement
//! insertion/removal. Reconciliation components ask the manager to *plan* a
//! movement and hand the resulting [`LedgerCommit`] to their own store so the
//! ledger effect commits atomically with their bookkeeping rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use despensa_core::{
    DomainError, DomainResult, ExpectedVersion, LotId, MovementId, MovementReference,
    ReferenceKind, SupplyItemId, UserId,
};

use crate::item::{Lot, NewLotAttributes, SupplyItem};
use crate::movement::{Direction, Movement};
use crate::store::{CostUpdate, LedgerCommit, LedgerStore, LotChange};

/// Which lot(s) a movement applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotTarget {
    /// A specific lot: entries augment the batch, exits consume from it.
    Existing(LotId),
    /// A new batch materialized by the entry.
    New(NewLotAttributes),
    /// Policy selection: exits rotate lots by earliest expiration; entries
    /// materialize an adjustment lot.
    Auto,
}

/// One quantity-changing event to apply to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub item_id: SupplyItemId,
    pub target: LotTarget,
    pub direction: Direction,
    pub quantity: Decimal,
    /// Entries default to the item's weighted average when omitted; exits are
    /// always costed at the item average.
    pub unit_cost: Option<Decimal>,
    pub reference: MovementReference,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Effect summary returned by [`LedgerManager::apply_movement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub movements: Vec<Movement>,
    pub total_quantity: Decimal,
    pub lots_touched: Vec<LotId>,
    /// True when the request's reference had already been applied and the
    /// call was a no-op returning the prior effect.
    pub already_applied: bool,
}

/// A planned movement: the atomic commit plus its effect summary.
#[derive(Debug, Clone)]
pub struct PlannedMovement {
    pub commit: LedgerCommit,
    pub summary: MovementSummary,
}

/// Effect summary of an exact-match reference reversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalSummary {
    pub movements_removed: Vec<MovementId>,
    pub lots_touched: Vec<LotId>,
    pub quantity_reversed: Decimal,
}

/// A planned reversal: the atomic commit plus its effect summary.
#[derive(Debug, Clone)]
pub struct PlannedReversal {
    pub commit: LedgerCommit,
    pub summary: ReversalSummary,
}

/// Derived stock for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item: SupplyItem,
    pub stock_actual: Decimal,
}

/// Quantity taken from one lot by an exit plan.
#[derive(Debug, Clone, PartialEq)]
struct LotAllocation {
    lot: Lot,
    quantity: Decimal,
}

pub struct LedgerManager<S> {
    store: S,
}

impl<S> LedgerManager<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lots of one item (read passthrough for reconciliation components that
    /// need to resolve a batch before planning an entry).
    pub fn lots_for_item(&self, item: SupplyItemId) -> DomainResult<Vec<Lot>> {
        self.store.lots_for_item(item)
    }

    /// Derived stock: sum of the item's lots' current quantities.
    pub fn stock_actual(&self, item: SupplyItemId) -> DomainResult<Decimal> {
        // Resolve the item first so an unknown id fails with NotFound rather
        // than reporting an empty stock.
        let item = self.store.supply_item(item)?;
        let lots = self.store.lots_for_item(item.id)?;
        Ok(lots.iter().map(Lot::available).sum())
    }

    /// Derived stock of every active item (the audit snapshot source).
    pub fn stock_snapshot(&self) -> DomainResult<Vec<StockLevel>> {
        let mut levels = Vec::new();
        for item in self.store.supply_items()? {
            if !item.active {
                continue;
            }
            let lots = self.store.lots_for_item(item.id)?;
            let stock_actual = lots.iter().map(Lot::available).sum();
            levels.push(StockLevel { item, stock_actual });
        }
        levels.sort_by_key(|l| l.item.id);
        Ok(levels)
    }

    /// Plan a movement without committing it.
    ///
    /// Returns an empty commit with `already_applied = true` when the
    /// request's reference has already produced movements.
    pub fn plan_movement(&self, req: &MovementRequest) -> DomainResult<PlannedMovement> {
        if req.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("movement quantity must be positive"));
        }

        let existing = self.store.movements_with_reference(&req.reference)?;
        if !existing.is_empty() {
            return Ok(PlannedMovement {
                commit: LedgerCommit::default(),
                summary: summarize_existing(existing),
            });
        }

        let item = self.store.supply_item(req.item_id)?;
        match req.direction {
            Direction::Entrada => self.plan_entry(&item, req),
            Direction::Salida => self.plan_exit(&item, req),
        }
    }

    /// Plan and commit a movement as one atomic unit.
    pub fn apply_movement(&self, req: &MovementRequest) -> DomainResult<MovementSummary> {
        let planned = self.plan_movement(req)?;
        if !planned.commit.is_empty() {
            self.store.commit(planned.commit)?;
        }
        Ok(planned.summary)
    }

    fn plan_entry(&self, item: &SupplyItem, req: &MovementRequest) -> DomainResult<PlannedMovement> {
        let unit_cost = req.unit_cost.unwrap_or(item.avg_unit_cost);
        let stock_before: Decimal = self
            .store
            .lots_for_item(item.id)?
            .iter()
            .map(Lot::available)
            .sum();

        let (lot_id, change) = match &req.target {
            LotTarget::Existing(lot_id) => {
                let lot = self.resolve_lot(*lot_id, item.id)?;
                (
                    lot.id,
                    LotChange::Update {
                        lot: lot.id,
                        current_quantity: lot.current_quantity + req.quantity,
                        initial_quantity: lot.initial_quantity + req.quantity,
                        expected: ExpectedVersion::Exact(lot.version),
                    },
                )
            }
            LotTarget::New(attrs) => {
                let lot = new_lot(item.id, req.quantity, unit_cost, attrs.clone());
                (lot.id, LotChange::Insert(lot))
            }
            // Adjustment entries (audit surplus) materialize a fresh lot so
            // the current <= initial invariant stays local to one batch.
            LotTarget::Auto => {
                let lot = new_lot(
                    item.id,
                    req.quantity,
                    unit_cost,
                    NewLotAttributes {
                        expiration: None,
                        location: None,
                    },
                );
                (lot.id, LotChange::Insert(lot))
            }
        };

        let movement = build_movement(item.id, Some(lot_id), req, req.quantity, unit_cost);
        let commit = LedgerCommit {
            lot_changes: vec![change],
            cost_updates: vec![CostUpdate {
                item: item.id,
                avg_unit_cost: weighted_average(
                    stock_before,
                    item.avg_unit_cost,
                    req.quantity,
                    unit_cost,
                ),
            }],
            insert_movements: vec![movement.clone()],
            remove_movements: Vec::new(),
        };

        Ok(PlannedMovement {
            commit,
            summary: MovementSummary {
                movements: vec![movement],
                total_quantity: req.quantity,
                lots_touched: vec![lot_id],
                already_applied: false,
            },
        })
    }

    fn plan_exit(&self, item: &SupplyItem, req: &MovementRequest) -> DomainResult<PlannedMovement> {
        // Exits never move the weighted average; they are costed at it.
        let unit_cost = req.unit_cost.unwrap_or(item.avg_unit_cost);

        let allocations = match &req.target {
            LotTarget::Existing(lot_id) => {
                let lot = self.resolve_lot(*lot_id, item.id)?;
                if lot.available() < req.quantity {
                    return Err(DomainError::InsufficientStock {
                        item: item.id,
                        requested: req.quantity,
                        available: lot.available(),
                    });
                }
                vec![LotAllocation {
                    lot,
                    quantity: req.quantity,
                }]
            }
            LotTarget::New(_) => {
                return Err(DomainError::validation("an exit cannot target a new lot"));
            }
            LotTarget::Auto => {
                let lots = self.store.lots_for_item(item.id)?;
                plan_fifo_exit(item.id, &lots, req.quantity)?
            }
        };

        let mut commit = LedgerCommit::default();
        let mut movements = Vec::with_capacity(allocations.len());
        let mut lots_touched = Vec::with_capacity(allocations.len());
        for alloc in &allocations {
            commit.lot_changes.push(LotChange::Update {
                lot: alloc.lot.id,
                current_quantity: alloc.lot.current_quantity - alloc.quantity,
                initial_quantity: alloc.lot.initial_quantity,
                expected: ExpectedVersion::Exact(alloc.lot.version),
            });
            let movement = build_movement(item.id, Some(alloc.lot.id), req, alloc.quantity, unit_cost);
            commit.insert_movements.push(movement.clone());
            movements.push(movement);
            lots_touched.push(alloc.lot.id);
        }

        Ok(PlannedMovement {
            commit,
            summary: MovementSummary {
                movements,
                total_quantity: req.quantity,
                lots_touched,
                already_applied: false,
            },
        })
    }

    /// Plan the exact-match reversal of every movement targeting `(kind, id)`.
    ///
    /// Entries are reversed by lowering both lot quantities; exits by
    /// restoring the consumed quantity. Fails with `InsufficientStock` when an
    /// entry can no longer be reversed because the stock was consumed since.
    pub fn plan_reversal(&self, kind: ReferenceKind, id: Uuid) -> DomainResult<PlannedReversal> {
        let movements = self.store.movements_targeting(kind, id)?;
        if movements.is_empty() {
            return Ok(PlannedReversal {
                commit: LedgerCommit::default(),
                summary: ReversalSummary {
                    movements_removed: Vec::new(),
                    lots_touched: Vec::new(),
                    quantity_reversed: Decimal::ZERO,
                },
            });
        }

        // Net the deltas per lot first; one receipt may have touched a lot
        // through several movements.
        let mut deltas: BTreeMap<LotId, (Decimal, Decimal)> = BTreeMap::new();
        let mut quantity_reversed = Decimal::ZERO;
        for movement in &movements {
            quantity_reversed += movement.quantity;
            if let Some(lot_id) = movement.lot_id {
                let entry = deltas.entry(lot_id).or_insert((Decimal::ZERO, Decimal::ZERO));
                match movement.direction {
                    Direction::Entrada => {
                        entry.0 -= movement.quantity;
                        entry.1 -= movement.quantity;
                    }
                    Direction::Salida => {
                        entry.0 += movement.quantity;
                    }
                }
            }
        }

        let mut lot_changes = Vec::with_capacity(deltas.len());
        let mut lots_touched = Vec::with_capacity(deltas.len());
        for (lot_id, (current_delta, initial_delta)) in deltas {
            let lot = self.store.lot(lot_id)?;
            let current_quantity = lot.current_quantity + current_delta;
            let initial_quantity = lot.initial_quantity + initial_delta;
            if current_quantity < Decimal::ZERO {
                return Err(DomainError::InsufficientStock {
                    item: lot.item_id,
                    requested: -current_delta,
                    available: lot.current_quantity,
                });
            }
            if current_quantity > initial_quantity {
                return Err(DomainError::conflict(format!(
                    "reversal would leave lot {lot_id} above its initial quantity"
                )));
            }
            lot_changes.push(LotChange::Update {
                lot: lot_id,
                current_quantity,
                initial_quantity,
                expected: ExpectedVersion::Exact(lot.version),
            });
            lots_touched.push(lot_id);
        }

        let movements_removed: Vec<MovementId> = movements.iter().map(|m| m.id).collect();
        Ok(PlannedReversal {
            commit: LedgerCommit {
                lot_changes,
                cost_updates: Vec::new(),
                insert_movements: Vec::new(),
                remove_movements: movements_removed.clone(),
            },
            summary: ReversalSummary {
                movements_removed,
                lots_touched,
                quantity_reversed,
            },
        })
    }

    /// Plan and commit a reference reversal as one atomic unit.
    pub fn unapply_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
    ) -> DomainResult<ReversalSummary> {
        let planned = self.plan_reversal(kind, id)?;
        if !planned.commit.is_empty() {
            self.store.commit(planned.commit)?;
        }
        Ok(planned.summary)
    }

    fn resolve_lot(&self, lot_id: LotId, item_id: SupplyItemId) -> DomainResult<Lot> {
        let lot = self.store.lot(lot_id)?;
        if lot.item_id != item_id {
            return Err(DomainError::validation(format!(
                "lot {} does not belong to item {}",
                lot.id, item_id
            )));
        }
        Ok(lot)
    }
}

fn new_lot(
    item_id: SupplyItemId,
    quantity: Decimal,
    unit_cost: Decimal,
    attrs: NewLotAttributes,
) -> Lot {
    Lot {
        id: LotId::new(),
        item_id,
        initial_quantity: quantity,
        current_quantity: quantity,
        unit_cost,
        expiration: attrs.expiration,
        location: attrs.location,
        version: 0,
    }
}

fn build_movement(
    item_id: SupplyItemId,
    lot_id: Option<LotId>,
    req: &MovementRequest,
    quantity: Decimal,
    unit_cost: Decimal,
) -> Movement {
    Movement {
        id: MovementId::new(),
        item_id,
        lot_id,
        direction: req.direction,
        quantity,
        unit_cost,
        total_cost: quantity * unit_cost,
        occurred_at: req.occurred_at,
        actor: req.actor,
        reference: req.reference,
        note: req.note.clone(),
    }
}

fn summarize_existing(movements: Vec<Movement>) -> MovementSummary {
    let total_quantity = movements.iter().map(|m| m.quantity).sum();
    let lots_touched = movements.iter().filter_map(|m| m.lot_id).collect();
    MovementSummary {
        total_quantity,
        lots_touched,
        movements,
        already_applied: true,
    }
}

/// Weighted-average cost after an entry of `quantity` at `unit_cost`.
fn weighted_average(
    stock: Decimal,
    avg_cost: Decimal,
    quantity: Decimal,
    unit_cost: Decimal,
) -> Decimal {
    let total = stock + quantity;
    if total <= Decimal::ZERO {
        return unit_cost;
    }
    (stock * avg_cost + quantity * unit_cost) / total
}

/// FIFO-by-expiration exit plan: earliest expiration first (undated lots
/// last), ties broken by ascending lot id, spilling across lots until the
/// requested quantity is covered.
fn plan_fifo_exit(
    item: SupplyItemId,
    lots: &[Lot],
    quantity: Decimal,
) -> DomainResult<Vec<LotAllocation>> {
    let mut eligible: Vec<&Lot> = lots.iter().filter(|l| l.available() > Decimal::ZERO).collect();
    eligible.sort_by_key(|l| (l.expiration.is_none(), l.expiration, l.id));

    let available: Decimal = eligible.iter().map(|l| l.available()).sum();
    if available < quantity {
        return Err(DomainError::InsufficientStock {
            item,
            requested: quantity,
            available,
        });
    }

    let mut remaining = quantity;
    let mut allocations = Vec::new();
    for lot in eligible {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(lot.available());
        allocations.push(LotAllocation {
            lot: lot.clone(),
            quantity: take,
        });
        remaining -= take;
    }
    Ok(allocations)
}
