//! `despensa-audit` — inventory audits and Audit Reconciliation.
//!
//! An audit snapshots expected stock, accepts physical counts, and on
//! completion turns *justified* discrepancies into adjustment movements
//! through the Lot & Ledger Manager. The audit is a justification gate, not a
//! free-form stock override: a difference without a causal code is never
//! applied.

pub mod audit;
pub mod service;
pub mod store;

pub use audit::{AdjustmentCause, AuditLine, AuditStatus, InventoryAudit};
pub use service::{AuditCompletion, AuditReconciliation, RecordCount, StartAudit};
pub use store::AuditStore;
