//! Narrow persistence capability of Audit Reconciliation.

use std::sync::Arc;

use despensa_core::{AuditId, DomainResult, SupplyItemId};
use despensa_ledger::LedgerCommit;

use crate::audit::{AuditLine, InventoryAudit};

/// Transactional repository capability consumed by Audit Reconciliation.
pub trait AuditStore: Send + Sync {
    fn audit(&self, id: AuditId) -> DomainResult<InventoryAudit>;

    fn audit_lines(&self, id: AuditId) -> DomainResult<Vec<AuditLine>>;

    fn audit_line(&self, id: AuditId, item: SupplyItemId) -> DomainResult<AuditLine>;

    /// Insert the audit header with its full line snapshot atomically.
    fn insert_audit(&self, audit: InventoryAudit, lines: Vec<AuditLine>) -> DomainResult<()>;

    /// Replace one line (count/cause/notes while `en_progreso`).
    fn update_line(&self, line: AuditLine) -> DomainResult<()>;

    /// Replace the audit header (status change on cancellation).
    fn update_audit(&self, audit: InventoryAudit) -> DomainResult<()>;

    /// Close the audit and apply every adjustment in one atomic unit.
    fn commit_completion(&self, audit: InventoryAudit, ledger: LedgerCommit) -> DomainResult<()>;
}

impl<S> AuditStore for Arc<S>
where
    S: AuditStore + ?Sized,
{
    fn audit(&self, id: AuditId) -> DomainResult<InventoryAudit> {
        (**self).audit(id)
    }

    fn audit_lines(&self, id: AuditId) -> DomainResult<Vec<AuditLine>> {
        (**self).audit_lines(id)
    }

    fn audit_line(&self, id: AuditId, item: SupplyItemId) -> DomainResult<AuditLine> {
        (**self).audit_line(id, item)
    }

    fn insert_audit(&self, audit: InventoryAudit, lines: Vec<AuditLine>) -> DomainResult<()> {
        (**self).insert_audit(audit, lines)
    }

    fn update_line(&self, line: AuditLine) -> DomainResult<()> {
        (**self).update_line(line)
    }

    fn update_audit(&self, audit: InventoryAudit) -> DomainResult<()> {
        (**self).update_audit(audit)
    }

    fn commit_completion(&self, audit: InventoryAudit, ledger: LedgerCommit) -> DomainResult<()> {
        (**self).commit_completion(audit, ledger)
    }
}
