use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpsellId(pub String);

/// A bookable room type. `price` is the nightly rate in major currency units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
}

impl Room {
    pub fn nightly_price_cents(&self) -> i64 {
        to_cents(self.price)
    }
}

/// An optional extra suggested alongside a quote. Never billed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upsell {
    pub id: UpsellId,
    pub name: String,
    pub price: Decimal,
}

impl Upsell {
    pub fn price_cents(&self) -> i64 {
        to_cents(self.price)
    }
}

pub(crate) fn to_cents(amount: Decimal) -> i64 {
    let cents = (amount * Decimal::ONE_HUNDRED).round();
    i64::try_from(cents).unwrap_or(i64::MAX)
}
