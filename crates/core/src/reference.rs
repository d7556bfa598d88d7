//! Typed movement references.
//!
//! Every side-effect row in the ledger records the operation that produced it
//! as a structured `(kind, id, line)` triple. Idempotency checks and the
//! order-deletion cascade match on these fields exactly; nothing ever scans
//! free-text descriptions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{AuditId, OrderLineId, ReceiptId, SupplyItemId};

/// The kind of operation a movement originates from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Receipt,
    Audit,
    Sale,
}

impl core::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ReferenceKind::Receipt => "receipt",
            ReferenceKind::Audit => "audit",
            ReferenceKind::Sale => "sale",
        };
        f.write_str(s)
    }
}

/// Originating reference of a movement: `receipt:{receipt}:{order_line}`,
/// `audit:{audit}:{item}`, `sale:{sale}`.
///
/// `line` qualifies the operation within its parent (the order line of a
/// receipt entry, the item of an audit adjustment) so a retried operation maps
/// back to the same reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementReference {
    pub kind: ReferenceKind,
    pub id: Uuid,
    pub line: Option<Uuid>,
}

impl MovementReference {
    pub fn receipt(receipt: ReceiptId, order_line: OrderLineId) -> Self {
        Self {
            kind: ReferenceKind::Receipt,
            id: receipt.into(),
            line: Some(order_line.into()),
        }
    }

    pub fn audit(audit: AuditId, item: SupplyItemId) -> Self {
        Self {
            kind: ReferenceKind::Audit,
            id: audit.into(),
            line: Some(item.into()),
        }
    }

    pub fn sale(sale: Uuid) -> Self {
        Self {
            kind: ReferenceKind::Sale,
            id: sale,
            line: None,
        }
    }

    /// Exact match on `(kind, id)`, ignoring the line qualifier.
    ///
    /// Used by the order-deletion cascade to find every movement a receipt
    /// produced regardless of which order line it was recorded against.
    pub fn targets(&self, kind: ReferenceKind, id: Uuid) -> bool {
        self.kind == kind && self.id == id
    }
}

impl core::fmt::Display for MovementReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}:{}", self.kind, self.id, line),
            None => write!(f, "{}:{}", self.kind, self.id),
        }
    }
}
