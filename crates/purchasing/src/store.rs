//! Narrow persistence capability of Receipt Reconciliation.

use std::sync::Arc;

use rust_decimal::Decimal;

use despensa_core::{DomainResult, OrderLineId, PurchaseOrderId, ReceiptId};
use despensa_ledger::LedgerCommit;

use crate::order::{OrderStatus, PurchaseOrder, PurchaseOrderLine};
use crate::receipt::{GoodsReceipt, ReceiptLine};

/// Atomic unit for one recorded receipt line: the new line, the order line's
/// raised cumulative quantity, and the planned ledger effect. Either all of
/// it commits or none does.
#[derive(Debug, Clone)]
pub struct ReceiptLineCommit {
    pub line: ReceiptLine,
    pub order_line: OrderLineId,
    pub quantity_received: Decimal,
    pub ledger: LedgerCommit,
}

/// Transactional repository capability consumed by Receipt Reconciliation.
pub trait PurchasingStore: Send + Sync {
    fn order(&self, id: PurchaseOrderId) -> DomainResult<PurchaseOrder>;

    fn order_line(&self, id: OrderLineId) -> DomainResult<PurchaseOrderLine>;

    fn order_lines(&self, order: PurchaseOrderId) -> DomainResult<Vec<PurchaseOrderLine>>;

    fn receipt(&self, id: ReceiptId) -> DomainResult<GoodsReceipt>;

    fn receipts_for_order(&self, order: PurchaseOrderId) -> DomainResult<Vec<GoodsReceipt>>;

    fn receipt_lines(&self, receipt: ReceiptId) -> DomainResult<Vec<ReceiptLine>>;

    /// Apply a recorded receipt line atomically (line insert + cumulative
    /// update + ledger effect).
    fn commit_receipt_line(&self, commit: ReceiptLineCommit) -> DomainResult<()>;

    fn update_order_status(&self, order: PurchaseOrderId, status: OrderStatus)
        -> DomainResult<()>;

    /// Remove all lines of a receipt; returns how many were removed.
    fn remove_receipt_lines(&self, receipt: ReceiptId) -> DomainResult<usize>;

    fn remove_receipt(&self, receipt: ReceiptId) -> DomainResult<()>;

    /// Residual pass of the deletion cascade: remove receipt lines still
    /// referencing an order line directly.
    fn remove_receipt_lines_for_order_line(&self, line: OrderLineId) -> DomainResult<usize>;

    fn remove_order_lines(&self, order: PurchaseOrderId) -> DomainResult<usize>;

    fn remove_order(&self, order: PurchaseOrderId) -> DomainResult<()>;
}

impl<S> PurchasingStore for Arc<S>
where
    S: PurchasingStore + ?Sized,
{
    fn order(&self, id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        (**self).order(id)
    }

    fn order_line(&self, id: OrderLineId) -> DomainResult<PurchaseOrderLine> {
        (**self).order_line(id)
    }

    fn order_lines(&self, order: PurchaseOrderId) -> DomainResult<Vec<PurchaseOrderLine>> {
        (**self).order_lines(order)
    }

    fn receipt(&self, id: ReceiptId) -> DomainResult<GoodsReceipt> {
        (**self).receipt(id)
    }

    fn receipts_for_order(&self, order: PurchaseOrderId) -> DomainResult<Vec<GoodsReceipt>> {
        (**self).receipts_for_order(order)
    }

    fn receipt_lines(&self, receipt: ReceiptId) -> DomainResult<Vec<ReceiptLine>> {
        (**self).receipt_lines(receipt)
    }

    fn commit_receipt_line(&self, commit: ReceiptLineCommit) -> DomainResult<()> {
        (**self).commit_receipt_line(commit)
    }

    fn update_order_status(
        &self,
        order: PurchaseOrderId,
        status: OrderStatus,
    ) -> DomainResult<()> {
        (**self).update_order_status(order, status)
    }

    fn remove_receipt_lines(&self, receipt: ReceiptId) -> DomainResult<usize> {
        (**self).remove_receipt_lines(receipt)
    }

    fn remove_receipt(&self, receipt: ReceiptId) -> DomainResult<()> {
        (**self).remove_receipt(receipt)
    }

    fn remove_receipt_lines_for_order_line(&self, line: OrderLineId) -> DomainResult<usize> {
        (**self).remove_receipt_lines_for_order_line(line)
    }

    fn remove_order_lines(&self, order: PurchaseOrderId) -> DomainResult<usize> {
        (**self).remove_order_lines(order)
    }

    fn remove_order(&self, order: PurchaseOrderId) -> DomainResult<()> {
        (**self).remove_order(order)
    }
}
