use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::domain::room::{Room, RoomId, Upsell};
use crate::domain::session::{Slots, StayDate};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayQuote {
    pub room: Room,
    pub check_in: StayDate,
    pub check_out: StayDate,
    pub nights: u32,
    pub price_cents: i64,
    pub total_cents: i64,
    /// Suggested only; never part of `total_cents`.
    pub suggested_upsell: Option<Upsell>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("cannot quote before these slots are filled: {0:?}")]
    IncompleteSlots(Vec<String>),
    #[error("room `{0}` is not in the catalog")]
    UnknownRoom(RoomId),
}

/// Whole nights between the two dates, never less than one. Unparsable or
/// reversed dates fall back to a single night.
pub fn nights_between(check_in: &StayDate, check_out: &StayDate) -> u32 {
    match (check_in.as_date(), check_out.as_date()) {
        (Some(start), Some(end)) => {
            let days = (end - start).num_days();
            u32::try_from(days).unwrap_or(1).max(1)
        }
        _ => 1,
    }
}

pub fn quote_stay(catalog: &Catalog, slots: &Slots) -> Result<StayQuote, PricingError> {
    let (Some(check_in), Some(check_out), Some(_guests), Some(room_id)) =
        (&slots.check_in, &slots.check_out, slots.guests, &slots.room_type)
    else {
        return Err(PricingError::IncompleteSlots(slots.missing_fields()));
    };

    let room = catalog.room(room_id).ok_or_else(|| PricingError::UnknownRoom(room_id.clone()))?;
    let nights = nights_between(check_in, check_out);
    let price_cents = room.nightly_price_cents();
    let total_cents = price_cents.saturating_mul(i64::from(nights));

    Ok(StayQuote {
        room: room.clone(),
        check_in: check_in.clone(),
        check_out: check_out.clone(),
        nights,
        price_cents,
        total_cents,
        suggested_upsell: catalog.first_upsell().cloned(),
    })
}

pub fn currency_symbol(currency: &str) -> String {
    match currency.trim().to_ascii_lowercase().as_str() {
        "eur" => "€".to_string(),
        "usd" => "$".to_string(),
        "gbp" => "£".to_string(),
        other => format!("{} ", other.to_ascii_uppercase()),
    }
}

/// Formats minor units with two decimals, e.g. `24000` in `eur` as `€240.00`.
pub fn format_money(cents: i64, currency: &str) -> String {
    format!("{}{:.2}", currency_symbol(currency), Decimal::new(cents, 2))
}

pub fn quote_message(quote: &StayQuote, currency: &str) -> String {
    let mut message = format!(
        "{} for {} night(s): total {}.",
        quote.room.name,
        quote.nights,
        format_money(quote.total_cents, currency)
    );
    if let Some(upsell) = &quote.suggested_upsell {
        message.push_str(&format!(
            "\nAdd {} for {}? Just ask at check-in.",
            upsell.name,
            format_money(upsell.price_cents(), currency)
        ));
    }
    message.push_str("\nReply YES to receive your payment link.");
    message
}
