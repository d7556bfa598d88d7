use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{Entity, OrderLineId, PurchaseOrderId, SupplierId, SupplyItemId};

/// Purchase order status lifecycle (`pendiente`, `aprobada`, `recibida`,
/// `cancelada`). `recibida` and `cancelada` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pendiente,
    Aprobada,
    Recibida,
    Cancelada,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Recibida | OrderStatus::Cancelada)
    }

    /// Static transition table. Receipt-dependent guards (a justifying
    /// receipt line for `recibida`, no receipt lines for `cancelada`) are
    /// checked by the reconciliation service on top of this.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        match (self, to) {
            (OrderStatus::Pendiente, OrderStatus::Aprobada) => true,
            (OrderStatus::Pendiente | OrderStatus::Aprobada, OrderStatus::Recibida) => true,
            (OrderStatus::Pendiente | OrderStatus::Aprobada, OrderStatus::Cancelada) => true,
            _ => false,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderStatus::Pendiente => "pendiente",
            OrderStatus::Aprobada => "aprobada",
            OrderStatus::Recibida => "recibida",
            OrderStatus::Cancelada => "cancelada",
        };
        f.write_str(s)
    }
}

/// Purchase order header (`orden_compra`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub ordered_at: NaiveDate,
    pub status: OrderStatus,
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Purchase order line (`detalle_orden_compra`) with its running received
/// quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: OrderLineId,
    pub order_id: PurchaseOrderId,
    pub item_id: SupplyItemId,
    pub quantity_ordered: Decimal,
    pub unit_price: Decimal,
    pub quantity_received: Decimal,
}

impl PurchaseOrderLine {
    pub fn remaining(&self) -> Decimal {
        self.quantity_ordered - self.quantity_received
    }
}

impl Entity for PurchaseOrderLine {
    type Id = OrderLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
