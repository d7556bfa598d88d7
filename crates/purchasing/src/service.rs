//! Receipt Reconciliation: goods receipts into ledger movements, purchase
//! order lifecycle, cascading deletion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{
    DomainError, DomainResult, MovementReference, OrderLineId, PurchaseOrderId, ReceiptId,
    ReceiptLineId, ReferenceKind, SupplyItemId, UserId,
};
use despensa_ledger::{
    Direction, LedgerManager, LedgerStore, LotTarget, MovementRequest, MovementSummary,
    NewLotAttributes,
};

use crate::order::{OrderStatus, PurchaseOrder};
use crate::receipt::ReceiptLine;
use crate::store::{PurchasingStore, ReceiptLineCommit};

/// Receiving policy knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingConfig {
    /// Absolute quantity a cumulative receipt may exceed the ordered quantity
    /// by before it is rejected as an over-receipt. Zero by default.
    pub over_receipt_tolerance: Decimal,
}

impl Default for ReceivingConfig {
    fn default() -> Self {
        Self {
            over_receipt_tolerance: Decimal::ZERO,
        }
    }
}

/// One goods-receipt line to record against an order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReceiptLine {
    pub receipt_id: ReceiptId,
    pub order_line_id: OrderLineId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Batch attributes; a matching existing lot is augmented, otherwise a
    /// new lot materializes.
    pub lot: NewLotAttributes,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Outcome of [`ReceiptReconciliation::record_receipt_line`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLineRecorded {
    pub line: ReceiptLine,
    pub movements: MovementSummary,
    /// The order line's cumulative received quantity after this call.
    pub quantity_received: Decimal,
}

/// One receipt the deletion cascade could not clean up.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedReceipt {
    pub receipt: ReceiptId,
    pub reason: DomainError,
}

/// Observable report of the best-effort deletion cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCleanup {
    pub order: PurchaseOrderId,
    pub receipts_cleaned: Vec<ReceiptId>,
    pub receipts_skipped: Vec<SkippedReceipt>,
    pub receipt_lines_removed: usize,
    pub order_lines_removed: usize,
    pub movements_removed: usize,
}

impl OrderCleanup {
    fn new(order: PurchaseOrderId) -> Self {
        Self {
            order,
            receipts_cleaned: Vec::new(),
            receipts_skipped: Vec::new(),
            receipt_lines_removed: 0,
            order_lines_removed: 0,
            movements_removed: 0,
        }
    }
}

/// Receipt Reconciliation service.
///
/// The only writer of entry movements; delegates all quantity/cost math to
/// the Lot & Ledger Manager and commits the ledger effect atomically with its
/// own bookkeeping rows.
pub struct ReceiptReconciliation<P, L> {
    store: P,
    ledger: LedgerManager<L>,
    config: ReceivingConfig,
}

impl<P, L> ReceiptReconciliation<P, L>
where
    P: PurchasingStore,
    L: LedgerStore,
{
    pub fn new(store: P, ledger: LedgerManager<L>) -> Self {
        Self::with_config(store, ledger, ReceivingConfig::default())
    }

    pub fn with_config(store: P, ledger: LedgerManager<L>, config: ReceivingConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Record one received line as a single atomic unit: create/augment the
    /// lot, post the entry movement, raise the order line's cumulative
    /// quantity.
    ///
    /// Retry-safe: the movement reference is `receipt:{receipt}:{order_line}`,
    /// so a duplicate call re-applies nothing.
    pub fn record_receipt_line(
        &self,
        req: RecordReceiptLine,
    ) -> DomainResult<ReceiptLineRecorded> {
        if req.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("received quantity must be positive"));
        }

        let receipt = self.store.receipt(req.receipt_id)?;
        let order_line = self.store.order_line(req.order_line_id)?;
        if order_line.order_id != receipt.order_id {
            return Err(DomainError::validation(format!(
                "order line {} does not belong to the order of receipt {}",
                order_line.id, receipt.id
            )));
        }

        let reference = MovementReference::receipt(receipt.id, order_line.id);
        let target = self.resolve_lot_target(order_line.item_id, &req)?;
        let planned = self.ledger.plan_movement(&MovementRequest {
            item_id: order_line.item_id,
            target,
            direction: Direction::Entrada,
            quantity: req.quantity,
            unit_cost: Some(req.unit_cost),
            reference,
            actor: req.actor,
            occurred_at: req.occurred_at,
            note: req.note.clone(),
        })?;

        if planned.summary.already_applied {
            let line = self
                .store
                .receipt_lines(receipt.id)?
                .into_iter()
                .find(|l| l.order_line_id == order_line.id)
                .ok_or_else(|| {
                    DomainError::not_found("receipt line for order line", order_line.id)
                })?;
            return Ok(ReceiptLineRecorded {
                line,
                movements: planned.summary,
                quantity_received: order_line.quantity_received,
            });
        }

        let quantity_received = order_line.quantity_received + req.quantity;
        if quantity_received > order_line.quantity_ordered + self.config.over_receipt_tolerance {
            return Err(DomainError::OverReceipt {
                order_line: order_line.id,
                ordered: order_line.quantity_ordered,
                already_received: order_line.quantity_received,
                incoming: req.quantity,
                tolerance: self.config.over_receipt_tolerance,
            });
        }

        let lot_id = match planned.summary.lots_touched.as_slice() {
            [lot] => *lot,
            _ => {
                return Err(DomainError::storage(
                    "receipt entry plan must touch exactly one lot",
                ));
            }
        };
        let line = ReceiptLine {
            id: ReceiptLineId::new(),
            receipt_id: receipt.id,
            order_line_id: order_line.id,
            item_id: order_line.item_id,
            lot_id,
            quantity: req.quantity,
            unit_cost: req.unit_cost,
        };

        self.store.commit_receipt_line(ReceiptLineCommit {
            line: line.clone(),
            order_line: order_line.id,
            quantity_received,
            ledger: planned.commit,
        })?;

        tracing::debug!(
            receipt = %receipt.id,
            order_line = %order_line.id,
            quantity = %req.quantity,
            "receipt line recorded"
        );

        Ok(ReceiptLineRecorded {
            line,
            movements: planned.summary,
            quantity_received,
        })
    }

    /// Drive the order status lifecycle.
    pub fn transition_order_status(
        &self,
        order_id: PurchaseOrderId,
        target: OrderStatus,
    ) -> DomainResult<PurchaseOrder> {
        let order = self.store.order(order_id)?;
        if !order.status.can_transition(target) {
            return Err(DomainError::invalid_transition(
                "purchase order",
                order_id,
                order.status,
                target,
            ));
        }

        match target {
            // An order cannot be marked received on paper alone: some receipt
            // must have produced at least one line (and thus a movement).
            OrderStatus::Recibida => {
                if !self.order_has_receipt_line(order_id)? {
                    return Err(DomainError::ReceiptMissing { order: order_id });
                }
            }
            OrderStatus::Cancelada => {
                if self.order_has_receipt_line(order_id)? {
                    return Err(DomainError::invalid_transition(
                        "purchase order",
                        order_id,
                        order.status,
                        target,
                    ));
                }
            }
            _ => {}
        }

        self.store.update_order_status(order_id, target)?;
        Ok(PurchaseOrder {
            status: target,
            ..order
        })
    }

    /// Best-effort cascading deletion.
    ///
    /// Receipts are cleaned one by one (lines, then movements via ledger
    /// reversal, then the receipt row); a failed receipt is logged and
    /// skipped. The receipt pass runs twice so writers interleaving with the
    /// cascade are still cleaned up. Only the final order-row deletion is
    /// fatal.
    pub fn delete_order(&self, order_id: PurchaseOrderId) -> DomainResult<OrderCleanup> {
        self.store.order(order_id)?;

        let mut cleanup = OrderCleanup::new(order_id);
        self.cleanup_receipts(order_id, &mut cleanup);

        // Residual lines referencing the order's lines directly, in case a
        // prior cascade attempt died half-way.
        match self.store.order_lines(order_id) {
            Ok(lines) => {
                for line in lines {
                    match self.store.remove_receipt_lines_for_order_line(line.id) {
                        Ok(n) => cleanup.receipt_lines_removed += n,
                        Err(e) => tracing::warn!(
                            order_line = %line.id,
                            error = %e,
                            "residual receipt line cleanup failed"
                        ),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(order = %order_id, error = %e, "could not list order lines")
            }
        }

        match self.store.remove_order_lines(order_id) {
            Ok(n) => cleanup.order_lines_removed = n,
            Err(e) => tracing::warn!(order = %order_id, error = %e, "order line removal failed"),
        }

        // Second pass covers receipts recorded while the cascade ran.
        self.cleanup_receipts(order_id, &mut cleanup);

        self.store.remove_order(order_id)?;
        Ok(cleanup)
    }

    fn order_has_receipt_line(&self, order_id: PurchaseOrderId) -> DomainResult<bool> {
        for receipt in self.store.receipts_for_order(order_id)? {
            if !self.store.receipt_lines(receipt.id)?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn cleanup_receipts(&self, order_id: PurchaseOrderId, cleanup: &mut OrderCleanup) {
        let receipts = match self.store.receipts_for_order(order_id) {
            Ok(receipts) => receipts,
            Err(e) => {
                tracing::warn!(order = %order_id, error = %e, "could not list receipts");
                return;
            }
        };

        for receipt in receipts {
            match self.cleanup_receipt(receipt.id) {
                Ok((lines_removed, movements_removed)) => {
                    cleanup.receipts_cleaned.push(receipt.id);
                    cleanup.receipt_lines_removed += lines_removed;
                    cleanup.movements_removed += movements_removed;
                }
                Err(reason) => {
                    tracing::warn!(
                        receipt = %receipt.id,
                        error = %reason,
                        "receipt cleanup failed; continuing with siblings"
                    );
                    cleanup.receipts_skipped.push(SkippedReceipt {
                        receipt: receipt.id,
                        reason,
                    });
                }
            }
        }
    }

    fn cleanup_receipt(&self, receipt: ReceiptId) -> DomainResult<(usize, usize)> {
        let lines_removed = self.store.remove_receipt_lines(receipt)?;
        let reversal = self
            .ledger
            .unapply_reference(ReferenceKind::Receipt, receipt.into())?;
        self.store.remove_receipt(receipt)?;
        Ok((lines_removed, reversal.movements_removed.len()))
    }

    fn resolve_lot_target(
        &self,
        item: SupplyItemId,
        req: &RecordReceiptLine,
    ) -> DomainResult<LotTarget> {
        let lots = self.ledger.lots_for_item(item)?;
        let matching = lots.into_iter().find(|lot| {
            lot.expiration == req.lot.expiration
                && lot.location == req.lot.location
                && lot.unit_cost == req.unit_cost
        });
        Ok(match matching {
            Some(lot) => LotTarget::Existing(lot.id),
            None => LotTarget::New(req.lot.clone()),
        })
    }
}
