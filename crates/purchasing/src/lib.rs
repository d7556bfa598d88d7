//! `despensa-purchasing` — purchase orders, goods receipts, and Receipt
//! Reconciliation.
//!
//! Translates goods receipts into ledger movements through the Lot & Ledger
//! Manager and keeps purchase-order state consistent (status lifecycle,
//! cumulative received quantities, cascading deletion).

pub mod order;
pub mod receipt;
pub mod service;
pub mod store;

pub use order::{OrderStatus, PurchaseOrder, PurchaseOrderLine};
pub use receipt::{GoodsReceipt, ReceiptLine};
pub use service::{
    OrderCleanup, ReceiptLineRecorded, ReceiptReconciliation, ReceivingConfig,
    RecordReceiptLine, SkippedReceipt,
};
pub use store::{PurchasingStore, ReceiptLineCommit};
