use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{AuditId, Entity, SupplyItemId, UserId};

/// Audit status lifecycle (`en_progreso`, `completada`, `cancelada`).
/// Both closed states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    EnProgreso,
    Completada,
    Cancelada,
}

impl AuditStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuditStatus::Completada | AuditStatus::Cancelada)
    }
}

impl core::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AuditStatus::EnProgreso => "en_progreso",
            AuditStatus::Completada => "completada",
            AuditStatus::Cancelada => "cancelada",
        };
        f.write_str(s)
    }
}

/// Causal code justifying a stock discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentCause {
    /// Shrinkage during handling or preparation.
    Merma,
    /// Expired product pulled from stock.
    Vencido,
    /// Damaged or spoiled product.
    Deterioro,
    /// Data-entry mistake in an earlier record.
    ErrorRegistro,
    Otro,
}

impl core::fmt::Display for AdjustmentCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AdjustmentCause::Merma => "merma",
            AdjustmentCause::Vencido => "vencido",
            AdjustmentCause::Deterioro => "deterioro",
            AdjustmentCause::ErrorRegistro => "error_registro",
            AdjustmentCause::Otro => "otro",
        };
        f.write_str(s)
    }
}

/// Inventory audit header (`auditoria_inventario`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAudit {
    pub id: AuditId,
    pub label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: AuditStatus,
    pub started_by: UserId,
    pub started_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Entity for InventoryAudit {
    type Id = AuditId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One snapshotted item within an audit (`auditoria_detalle`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLine {
    pub audit_id: AuditId,
    pub item_id: SupplyItemId,
    /// Derived stock at the moment the audit started.
    pub expected: Decimal,
    pub counted: Option<Decimal>,
    /// `counted - expected`, present once a count is recorded.
    pub difference: Option<Decimal>,
    pub cause: Option<AdjustmentCause>,
    pub notes: Option<String>,
}

impl AuditLine {
    /// A nonzero difference with no causal code: stored, surfaced to the
    /// caller, and silently excluded from the completion adjustment pass.
    pub fn is_unjustified(&self) -> bool {
        matches!(self.difference, Some(d) if d != Decimal::ZERO) && self.cause.is_none()
    }

    /// The adjustment this line contributes at completion, if any.
    pub fn adjustment(&self) -> Option<(Decimal, AdjustmentCause)> {
        let difference = self.difference?;
        if difference == Decimal::ZERO {
            return None;
        }
        let cause = self.cause?;
        Some((difference, cause))
    }
}
