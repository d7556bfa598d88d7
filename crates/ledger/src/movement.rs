use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use despensa_core::{Entity, LotId, MovementId, MovementReference, SupplyItemId, UserId};

/// Direction of a ledger movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entrada,
    Salida,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Direction::Entrada => f.write_str("entrada"),
            Direction::Salida => f.write_str("salida"),
        }
    }
}

/// An append-only ledger entry recording a quantity change with its cause and
/// cost (`movimiento_inventario`).
///
/// Once committed a movement is never mutated; it is removed only by the
/// order-deletion cascade (which reverses its lot effect in the same commit)
/// and by bulk reset tooling outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub item_id: SupplyItemId,
    pub lot_id: Option<LotId>,
    pub direction: Direction,
    /// Always positive; the direction carries the sign.
    pub quantity: Decimal,
    /// Unit cost at the time of the movement.
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub actor: UserId,
    pub reference: MovementReference,
    pub note: Option<String>,
}

impl Movement {
    /// Quantity with the direction's sign applied (`entrada` +, `salida` -).
    pub fn signed_quantity(&self) -> Decimal {
        match self.direction {
            Direction::Entrada => self.quantity,
            Direction::Salida => -self.quantity,
        }
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
