//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{OrderLineId, PurchaseOrderId, SupplyItemId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Every fatal variant names the offending entity;
/// presentation concerns (stack detail, localization) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An exit would drive a lot's current quantity below zero.
    #[error("insufficient stock for item {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: SupplyItemId,
        requested: Decimal,
        available: Decimal,
    },

    /// A receipt exceeds the ordered quantity beyond the configured tolerance.
    #[error(
        "over-receipt on order line {order_line}: ordered {ordered}, already received \
         {already_received}, incoming {incoming} (tolerance {tolerance})"
    )]
    OverReceipt {
        order_line: OrderLineId,
        ordered: Decimal,
        already_received: Decimal,
        incoming: Decimal,
        tolerance: Decimal,
    },

    /// An order cannot be marked received without at least one receipt line.
    #[error("order {order} cannot be marked received: no receipt line recorded")]
    ReceiptMissing { order: PurchaseOrderId },

    /// An audit date range is invalid.
    #[error("invalid audit period: {0}")]
    InvalidPeriod(String),

    /// A lifecycle transition is not allowed from the current state.
    #[error("invalid {entity} transition for {id}: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// A requested entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A concurrent writer won the race (stale version / compare-and-set miss).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed (lock poisoned, io error).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_period(msg: impl Into<String>) -> Self {
        Self::InvalidPeriod(msg.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl ToString,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
