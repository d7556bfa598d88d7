//! Narrow persistence capability of the Lot & Ledger Manager.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use despensa_core::{
    DomainResult, ExpectedVersion, LotId, MovementId, MovementReference, ReferenceKind,
    SupplyItemId,
};

use crate::item::{Lot, SupplyItem};
use crate::movement::Movement;

/// One lot mutation inside a ledger commit.
#[derive(Debug, Clone, PartialEq)]
pub enum LotChange {
    /// A new lot materialized by an entry.
    Insert(Lot),
    /// Quantity update for an existing lot, guarded by a version expectation.
    Update {
        lot: LotId,
        current_quantity: Decimal,
        initial_quantity: Decimal,
        expected: ExpectedVersion,
    },
}

/// Weighted-average cost update for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostUpdate {
    pub item: SupplyItemId,
    pub avg_unit_cost: Decimal,
}

/// Atomic batch of ledger effects: either everything lands or nothing does.
///
/// A commit is the unit the concurrency model (§ row-level serialization)
/// hangs off: the store validates every `ExpectedVersion` before mutating
/// anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerCommit {
    pub lot_changes: Vec<LotChange>,
    pub cost_updates: Vec<CostUpdate>,
    pub insert_movements: Vec<Movement>,
    pub remove_movements: Vec<MovementId>,
}

impl LedgerCommit {
    pub fn is_empty(&self) -> bool {
        self.lot_changes.is_empty()
            && self.cost_updates.is_empty()
            && self.insert_movements.is_empty()
            && self.remove_movements.is_empty()
    }

    /// Fold another commit into this one (independent effects only; callers
    /// must not merge commits touching the same lot).
    pub fn extend(&mut self, other: LedgerCommit) {
        self.lot_changes.extend(other.lot_changes);
        self.cost_updates.extend(other.cost_updates);
        self.insert_movements.extend(other.insert_movements);
        self.remove_movements.extend(other.remove_movements);
    }
}

/// Transactional repository capability consumed by the Lot & Ledger Manager.
///
/// Implementations must apply `commit` all-or-nothing and reject stale
/// `ExpectedVersion`s with `DomainError::Conflict`.
pub trait LedgerStore: Send + Sync {
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem>;

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>>;

    fn lot(&self, id: LotId) -> DomainResult<Lot>;

    /// All lots of one item, in unspecified order; callers sort by policy.
    fn lots_for_item(&self, item: SupplyItemId) -> DomainResult<Vec<Lot>>;

    /// Movements carrying exactly this reference (idempotency check).
    fn movements_with_reference(
        &self,
        reference: &MovementReference,
    ) -> DomainResult<Vec<Movement>>;

    /// Movements whose reference targets `(kind, id)` with any line qualifier
    /// (order-deletion cascade).
    fn movements_targeting(&self, kind: ReferenceKind, id: Uuid) -> DomainResult<Vec<Movement>>;

    /// Apply a batch atomically.
    fn commit(&self, commit: LedgerCommit) -> DomainResult<()>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem> {
        (**self).supply_item(id)
    }

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>> {
        (**self).supply_items()
    }

    fn lot(&self, id: LotId) -> DomainResult<Lot> {
        (**self).lot(id)
    }

    fn lots_for_item(&self, item: SupplyItemId) -> DomainResult<Vec<Lot>> {
        (**self).lots_for_item(item)
    }

    fn movements_with_reference(
        &self,
        reference: &MovementReference,
    ) -> DomainResult<Vec<Movement>> {
        (**self).movements_with_reference(reference)
    }

    fn movements_targeting(&self, kind: ReferenceKind, id: Uuid) -> DomainResult<Vec<Movement>> {
        (**self).movements_targeting(kind, id)
    }

    fn commit(&self, commit: LedgerCommit) -> DomainResult<()> {
        (**self).commit(commit)
    }
}
