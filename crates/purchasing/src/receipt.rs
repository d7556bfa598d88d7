use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{
    Entity, LotId, OrderLineId, PurchaseOrderId, ReceiptId, ReceiptLineId, SupplyItemId, UserId,
};

/// Goods receipt header (`recepcion_mercaderia`), linked to one purchase
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: ReceiptId,
    pub order_id: PurchaseOrderId,
    pub received_at: DateTime<Utc>,
    pub received_by: UserId,
}

impl Entity for GoodsReceipt {
    type Id = ReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Goods receipt line (`detalle_recepcion_mercaderia`): the received quantity
/// and the lot it materialized or augmented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub id: ReceiptLineId,
    pub receipt_id: ReceiptId,
    pub order_line_id: OrderLineId,
    pub item_id: SupplyItemId,
    pub lot_id: LotId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

impl Entity for ReceiptLine {
    type Id = ReceiptLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
