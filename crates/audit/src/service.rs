//! Audit Reconciliation: snapshot, count, justify, adjust.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{
    AuditId, DomainError, DomainResult, MovementReference, SupplyItemId, UserId,
};
use despensa_ledger::{
    Direction, LedgerCommit, LedgerManager, LedgerStore, LotTarget, MovementRequest,
    MovementSummary,
};

use crate::audit::{AdjustmentCause, AuditLine, AuditStatus, InventoryAudit};
use crate::store::AuditStore;

/// Parameters for starting an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAudit {
    pub label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub actor: UserId,
    /// The host's current date; the engine never reads the wall clock.
    pub today: NaiveDate,
    pub started_at: DateTime<Utc>,
}

/// One physical count to record against an audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCount {
    pub audit_id: AuditId,
    pub item_id: SupplyItemId,
    pub counted: Decimal,
    pub cause: Option<AdjustmentCause>,
    pub notes: Option<String>,
}

/// Outcome of [`AuditReconciliation::complete_audit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditCompletion {
    pub audit: InventoryAudit,
    pub adjustments: Vec<MovementSummary>,
    /// Items whose nonzero difference carried no causal code and was
    /// therefore excluded from the adjustment pass.
    pub skipped_unjustified: Vec<SupplyItemId>,
}

/// Audit Reconciliation service.
pub struct AuditReconciliation<A, L> {
    store: A,
    ledger: LedgerManager<L>,
}

impl<A, L> AuditReconciliation<A, L>
where
    A: AuditStore,
    L: LedgerStore,
{
    pub fn new(store: A, ledger: LedgerManager<L>) -> Self {
        Self { store, ledger }
    }

    /// Open an audit over a period and snapshot every active item's derived
    /// stock as the expected quantity.
    pub fn start_audit(&self, req: StartAudit) -> DomainResult<InventoryAudit> {
        if req.period_start > req.period_end {
            return Err(DomainError::invalid_period(format!(
                "period start {} is after period end {}",
                req.period_start, req.period_end
            )));
        }
        if req.period_start > req.today {
            return Err(DomainError::invalid_period(format!(
                "period start {} is in the future",
                req.period_start
            )));
        }

        let audit = InventoryAudit {
            id: AuditId::new(),
            label: req.label,
            period_start: req.period_start,
            period_end: req.period_end,
            status: AuditStatus::EnProgreso,
            started_by: req.actor,
            started_at: req.started_at,
            closed_at: None,
        };

        let lines: Vec<AuditLine> = self
            .ledger
            .stock_snapshot()?
            .into_iter()
            .map(|level| AuditLine {
                audit_id: audit.id,
                item_id: level.item.id,
                expected: level.stock_actual,
                counted: None,
                difference: None,
                cause: None,
                notes: None,
            })
            .collect();

        self.store.insert_audit(audit.clone(), lines)?;
        tracing::debug!(audit = %audit.id, label = %audit.label, "audit started");
        Ok(audit)
    }

    /// Record a physical count for one item.
    ///
    /// A zero difference clears any supplied cause; a nonzero difference
    /// without a cause is stored but flagged unjustified in the returned
    /// line, never an error, so the caller can prompt for a cause.
    pub fn record_count(&self, req: RecordCount) -> DomainResult<AuditLine> {
        let audit = self.store.audit(req.audit_id)?;
        self.ensure_in_progress(&audit, AuditStatus::EnProgreso)?;

        let mut line = self.store.audit_line(req.audit_id, req.item_id)?;
        let difference = req.counted - line.expected;
        line.counted = Some(req.counted);
        line.difference = Some(difference);
        line.cause = if difference == Decimal::ZERO {
            None
        } else {
            req.cause
        };
        line.notes = req.notes;

        self.store.update_line(line.clone())?;
        if line.is_unjustified() {
            tracing::debug!(
                audit = %req.audit_id,
                item = %req.item_id,
                difference = %difference,
                "count stored without causal justification"
            );
        }
        Ok(line)
    }

    /// Close the audit and apply every justified discrepancy as an adjustment
    /// movement, atomically with the status change.
    pub fn complete_audit(
        &self,
        audit_id: AuditId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<AuditCompletion> {
        let mut audit = self.store.audit(audit_id)?;
        self.ensure_in_progress(&audit, AuditStatus::Completada)?;

        let mut merged = LedgerCommit::default();
        let mut adjustments = Vec::new();
        let mut skipped_unjustified = Vec::new();

        for line in self.store.audit_lines(audit_id)? {
            let Some((difference, cause)) = line.adjustment() else {
                if line.is_unjustified() {
                    tracing::warn!(
                        audit = %audit_id,
                        item = %line.item_id,
                        difference = ?line.difference,
                        "unjustified difference excluded from adjustment pass"
                    );
                    skipped_unjustified.push(line.item_id);
                }
                continue;
            };

            let direction = if difference > Decimal::ZERO {
                Direction::Entrada
            } else {
                Direction::Salida
            };
            let planned = self.ledger.plan_movement(&MovementRequest {
                item_id: line.item_id,
                target: LotTarget::Auto,
                direction,
                quantity: difference.abs(),
                unit_cost: None,
                reference: MovementReference::audit(audit_id, line.item_id),
                actor,
                occurred_at,
                note: line.notes.clone().or_else(|| Some(cause.to_string())),
            })?;
            merged.extend(planned.commit);
            adjustments.push(planned.summary);
        }

        audit.status = AuditStatus::Completada;
        audit.closed_at = Some(occurred_at);
        self.store.commit_completion(audit.clone(), merged)?;

        Ok(AuditCompletion {
            audit,
            adjustments,
            skipped_unjustified,
        })
    }

    /// Close the audit without ever creating movements, regardless of the
    /// recorded counts.
    pub fn cancel_audit(
        &self,
        audit_id: AuditId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<InventoryAudit> {
        let mut audit = self.store.audit(audit_id)?;
        self.ensure_in_progress(&audit, AuditStatus::Cancelada)?;

        audit.status = AuditStatus::Cancelada;
        audit.closed_at = Some(occurred_at);
        self.store.update_audit(audit.clone())?;
        tracing::debug!(audit = %audit_id, actor = %actor, "audit cancelled");
        Ok(audit)
    }

    fn ensure_in_progress(&self, audit: &InventoryAudit, target: AuditStatus) -> DomainResult<()> {
        if audit.status != AuditStatus::EnProgreso {
            return Err(DomainError::invalid_transition(
                "audit",
                audit.id,
                audit.status,
                target,
            ));
        }
        Ok(())
    }
}
