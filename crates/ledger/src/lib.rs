//! `despensa-ledger` — stock ledger entities and the Lot & Ledger Manager.
//!
//! The manager is the only component allowed to change a lot's quantities or
//! a supply item's weighted-average cost, and the only component allowed to
//! insert (or, for the order-deletion cascade, remove) a `Movement`.

pub mod item;
pub mod manager;
pub mod movement;
pub mod store;

pub use item::{Lot, NewLotAttributes, StockClassification, SupplyItem};
pub use manager::{
    LedgerManager, LotTarget, MovementRequest, MovementSummary, PlannedMovement,
    PlannedReversal, ReversalSummary, StockLevel,
};
pub use movement::{Direction, Movement};
pub use store::{CostUpdate, LedgerCommit, LedgerStore, LotChange};
