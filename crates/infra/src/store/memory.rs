use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use despensa_core::{
    AuditId, DomainError, DomainResult, LotId, MovementReference, OrderLineId, PurchaseOrderId,
    ReceiptId, ReferenceKind, SupplyItemId,
};
use despensa_audit::{AuditLine, AuditStore, InventoryAudit};
use despensa_kardex::KardexStore;
use despensa_ledger::{
    CostUpdate, LedgerCommit, LedgerStore, Lot, LotChange, Movement, SupplyItem,
};
use despensa_purchasing::{
    GoodsReceipt, OrderStatus, PurchaseOrder, PurchaseOrderLine, PurchasingStore, ReceiptLine,
    ReceiptLineCommit,
};

#[derive(Debug, Default)]
struct State {
    items: HashMap<SupplyItemId, SupplyItem>,
    lots: HashMap<LotId, Lot>,
    movements: Vec<Movement>,
    orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    order_lines: HashMap<OrderLineId, PurchaseOrderLine>,
    receipts: HashMap<ReceiptId, GoodsReceipt>,
    receipt_lines: HashMap<despensa_core::ReceiptLineId, ReceiptLine>,
    audits: HashMap<AuditId, InventoryAudit>,
    audit_lines: HashMap<(AuditId, SupplyItemId), AuditLine>,
}

/// In-memory store implementing every engine capability over one shared
/// state.
///
/// Commits are validated in full before anything mutates, so a batch either
/// lands completely or not at all; the single write lock serializes writers
/// (a stricter equivalent of the row-level locking the engine requires).
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }

    /// Register a supply item (catalog maintenance is outside the engine).
    pub fn seed_item(&self, item: SupplyItem) -> DomainResult<()> {
        self.write()?.items.insert(item.id, item);
        Ok(())
    }

    /// Register a purchase order with its lines.
    pub fn seed_order(
        &self,
        order: PurchaseOrder,
        lines: Vec<PurchaseOrderLine>,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        for line in &lines {
            if line.order_id != order.id {
                return Err(DomainError::validation(format!(
                    "order line {} does not belong to order {}",
                    line.id, order.id
                )));
            }
        }
        state.orders.insert(order.id, order);
        for line in lines {
            state.order_lines.insert(line.id, line);
        }
        Ok(())
    }

    /// Register a goods receipt header (created by the receiving desk UI).
    pub fn seed_receipt(&self, receipt: GoodsReceipt) -> DomainResult<()> {
        let mut state = self.write()?;
        if !state.orders.contains_key(&receipt.order_id) {
            return Err(DomainError::not_found("purchase order", receipt.order_id));
        }
        state.receipts.insert(receipt.id, receipt);
        Ok(())
    }
}

/// Validate a ledger batch against current state without mutating anything.
fn check_ledger(state: &State, commit: &LedgerCommit) -> DomainResult<()> {
    for change in &commit.lot_changes {
        match change {
            LotChange::Insert(lot) => {
                if state.lots.contains_key(&lot.id) {
                    return Err(DomainError::conflict(format!("lot {} already exists", lot.id)));
                }
                if !state.items.contains_key(&lot.item_id) {
                    return Err(DomainError::not_found("supply item", lot.item_id));
                }
                lot.check_quantities()?;
            }
            LotChange::Update {
                lot,
                current_quantity,
                initial_quantity,
                expected,
            } => {
                let existing = state
                    .lots
                    .get(lot)
                    .ok_or_else(|| DomainError::not_found("lot", lot))?;
                expected.check(existing.version)?;
                let updated = Lot {
                    current_quantity: *current_quantity,
                    initial_quantity: *initial_quantity,
                    ..existing.clone()
                };
                updated.check_quantities()?;
            }
        }
    }

    for CostUpdate { item, .. } in &commit.cost_updates {
        if !state.items.contains_key(item) {
            return Err(DomainError::not_found("supply item", item));
        }
    }

    for id in &commit.remove_movements {
        if !state.movements.iter().any(|m| m.id == *id) {
            return Err(DomainError::not_found("movement", id));
        }
    }

    for movement in &commit.insert_movements {
        if !state.items.contains_key(&movement.item_id) {
            return Err(DomainError::not_found("supply item", movement.item_id));
        }
        if state.movements.iter().any(|m| m.id == movement.id) {
            return Err(DomainError::conflict(format!(
                "movement {} already exists",
                movement.id
            )));
        }
    }

    Ok(())
}

/// Apply a pre-validated ledger batch.
fn apply_ledger(state: &mut State, commit: LedgerCommit) {
    for change in commit.lot_changes {
        match change {
            LotChange::Insert(lot) => {
                state.lots.insert(lot.id, lot);
            }
            LotChange::Update {
                lot,
                current_quantity,
                initial_quantity,
                ..
            } => {
                if let Some(existing) = state.lots.get_mut(&lot) {
                    existing.current_quantity = current_quantity;
                    existing.initial_quantity = initial_quantity;
                    existing.version += 1;
                }
            }
        }
    }

    for CostUpdate { item, avg_unit_cost } in commit.cost_updates {
        if let Some(item) = state.items.get_mut(&item) {
            item.avg_unit_cost = avg_unit_cost;
        }
    }

    if !commit.remove_movements.is_empty() {
        state
            .movements
            .retain(|m| !commit.remove_movements.contains(&m.id));
    }
    state.movements.extend(commit.insert_movements);
}

impl LedgerStore for InMemoryStore {
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem> {
        self.read()?
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("supply item", id))
    }

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>> {
        let mut items: Vec<SupplyItem> = self.read()?.items.values().cloned().collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    fn lot(&self, id: LotId) -> DomainResult<Lot> {
        self.read()?
            .lots
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("lot", id))
    }

    fn lots_for_item(&self, item: SupplyItemId) -> DomainResult<Vec<Lot>> {
        let mut lots: Vec<Lot> = self
            .read()?
            .lots
            .values()
            .filter(|l| l.item_id == item)
            .cloned()
            .collect();
        lots.sort_by_key(|l| l.id);
        Ok(lots)
    }

    fn movements_with_reference(
        &self,
        reference: &MovementReference,
    ) -> DomainResult<Vec<Movement>> {
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| m.reference == *reference)
            .cloned()
            .collect())
    }

    fn movements_targeting(&self, kind: ReferenceKind, id: Uuid) -> DomainResult<Vec<Movement>> {
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| m.reference.targets(kind, id))
            .cloned()
            .collect())
    }

    fn commit(&self, commit: LedgerCommit) -> DomainResult<()> {
        let mut state = self.write()?;
        check_ledger(&state, &commit)?;
        apply_ledger(&mut state, commit);
        Ok(())
    }
}

impl PurchasingStore for InMemoryStore {
    fn order(&self, id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        self.read()?
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("purchase order", id))
    }

    fn order_line(&self, id: OrderLineId) -> DomainResult<PurchaseOrderLine> {
        self.read()?
            .order_lines
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("order line", id))
    }

    fn order_lines(&self, order: PurchaseOrderId) -> DomainResult<Vec<PurchaseOrderLine>> {
        let mut lines: Vec<PurchaseOrderLine> = self
            .read()?
            .order_lines
            .values()
            .filter(|l| l.order_id == order)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    fn receipt(&self, id: ReceiptId) -> DomainResult<GoodsReceipt> {
        self.read()?
            .receipts
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("receipt", id))
    }

    fn receipts_for_order(&self, order: PurchaseOrderId) -> DomainResult<Vec<GoodsReceipt>> {
        let mut receipts: Vec<GoodsReceipt> = self
            .read()?
            .receipts
            .values()
            .filter(|r| r.order_id == order)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| r.id);
        Ok(receipts)
    }

    fn receipt_lines(&self, receipt: ReceiptId) -> DomainResult<Vec<ReceiptLine>> {
        let mut lines: Vec<ReceiptLine> = self
            .read()?
            .receipt_lines
            .values()
            .filter(|l| l.receipt_id == receipt)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    fn commit_receipt_line(&self, commit: ReceiptLineCommit) -> DomainResult<()> {
        let mut state = self.write()?;
        check_ledger(&state, &commit.ledger)?;
        if state.receipt_lines.contains_key(&commit.line.id) {
            return Err(DomainError::conflict(format!(
                "receipt line {} already exists",
                commit.line.id
            )));
        }
        if !state.receipts.contains_key(&commit.line.receipt_id) {
            return Err(DomainError::not_found("receipt", commit.line.receipt_id));
        }
        if !state.order_lines.contains_key(&commit.order_line) {
            return Err(DomainError::not_found("order line", commit.order_line));
        }

        apply_ledger(&mut state, commit.ledger);
        state.receipt_lines.insert(commit.line.id, commit.line);
        if let Some(line) = state.order_lines.get_mut(&commit.order_line) {
            line.quantity_received = commit.quantity_received;
        }
        Ok(())
    }

    fn update_order_status(
        &self,
        order: PurchaseOrderId,
        status: OrderStatus,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        let row = state
            .orders
            .get_mut(&order)
            .ok_or_else(|| DomainError::not_found("purchase order", order))?;
        row.status = status;
        Ok(())
    }

    fn remove_receipt_lines(&self, receipt: ReceiptId) -> DomainResult<usize> {
        let mut state = self.write()?;
        let before = state.receipt_lines.len();
        state.receipt_lines.retain(|_, l| l.receipt_id != receipt);
        Ok(before - state.receipt_lines.len())
    }

    fn remove_receipt(&self, receipt: ReceiptId) -> DomainResult<()> {
        let mut state = self.write()?;
        state
            .receipts
            .remove(&receipt)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("receipt", receipt))
    }

    fn remove_receipt_lines_for_order_line(&self, line: OrderLineId) -> DomainResult<usize> {
        let mut state = self.write()?;
        let before = state.receipt_lines.len();
        state.receipt_lines.retain(|_, l| l.order_line_id != line);
        Ok(before - state.receipt_lines.len())
    }

    fn remove_order_lines(&self, order: PurchaseOrderId) -> DomainResult<usize> {
        let mut state = self.write()?;
        let before = state.order_lines.len();
        state.order_lines.retain(|_, l| l.order_id != order);
        Ok(before - state.order_lines.len())
    }

    fn remove_order(&self, order: PurchaseOrderId) -> DomainResult<()> {
        let mut state = self.write()?;
        state
            .orders
            .remove(&order)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("purchase order", order))
    }
}

impl AuditStore for InMemoryStore {
    fn audit(&self, id: AuditId) -> DomainResult<InventoryAudit> {
        self.read()?
            .audits
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("audit", id))
    }

    fn audit_lines(&self, id: AuditId) -> DomainResult<Vec<AuditLine>> {
        let mut lines: Vec<AuditLine> = self
            .read()?
            .audit_lines
            .values()
            .filter(|l| l.audit_id == id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.item_id);
        Ok(lines)
    }

    fn audit_line(&self, id: AuditId, item: SupplyItemId) -> DomainResult<AuditLine> {
        self.read()?
            .audit_lines
            .get(&(id, item))
            .cloned()
            .ok_or_else(|| DomainError::not_found("audit line", format!("{id}:{item}")))
    }

    fn insert_audit(&self, audit: InventoryAudit, lines: Vec<AuditLine>) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.audits.contains_key(&audit.id) {
            return Err(DomainError::conflict(format!(
                "audit {} already exists",
                audit.id
            )));
        }
        for line in &lines {
            if line.audit_id != audit.id {
                return Err(DomainError::validation(format!(
                    "audit line for item {} does not belong to audit {}",
                    line.item_id, audit.id
                )));
            }
        }
        for line in lines {
            state.audit_lines.insert((line.audit_id, line.item_id), line);
        }
        state.audits.insert(audit.id, audit);
        Ok(())
    }

    fn update_line(&self, line: AuditLine) -> DomainResult<()> {
        let mut state = self.write()?;
        let key = (line.audit_id, line.item_id);
        if !state.audit_lines.contains_key(&key) {
            return Err(DomainError::not_found(
                "audit line",
                format!("{}:{}", line.audit_id, line.item_id),
            ));
        }
        state.audit_lines.insert(key, line);
        Ok(())
    }

    fn update_audit(&self, audit: InventoryAudit) -> DomainResult<()> {
        let mut state = self.write()?;
        if !state.audits.contains_key(&audit.id) {
            return Err(DomainError::not_found("audit", audit.id));
        }
        state.audits.insert(audit.id, audit);
        Ok(())
    }

    fn commit_completion(&self, audit: InventoryAudit, ledger: LedgerCommit) -> DomainResult<()> {
        let mut state = self.write()?;
        if !state.audits.contains_key(&audit.id) {
            return Err(DomainError::not_found("audit", audit.id));
        }
        check_ledger(&state, &ledger)?;
        apply_ledger(&mut state, ledger);
        state.audits.insert(audit.id, audit);
        Ok(())
    }
}

impl KardexStore for InMemoryStore {
    fn supply_item(&self, id: SupplyItemId) -> DomainResult<SupplyItem> {
        LedgerStore::supply_item(self, id)
    }

    fn supply_items(&self) -> DomainResult<Vec<SupplyItem>> {
        LedgerStore::supply_items(self)
    }

    fn movements_for_item(
        &self,
        item: SupplyItemId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<Movement>> {
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| m.item_id == item)
            .filter(|m| from.is_none_or(|f| m.occurred_at >= f))
            .filter(|m| to.is_none_or(|t| m.occurred_at <= t))
            .cloned()
            .collect())
    }
}
