//! Heuristic field extraction from recognized receipt text.
//!
//! Each extractor is a pure function of the text. A field with no match is
//! left as `None`; parsing never fails.

pub mod date;
pub mod merchant;
pub mod total;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

/// Structured fields pulled out of a receipt's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFields {
    pub purchased_at: Option<NaiveDateTime>,
    pub merchant_name: Option<String>,
    pub total_amount: Option<Decimal>,
}

/// Runs every field extractor over the text.
pub fn parse_fields(text: &str) -> ReceiptFields {
    let _span = tracing::info_span!("fields.parse", chars = text.len()).entered();

    let fields = ReceiptFields {
        purchased_at: date::find_purchase_date(text),
        merchant_name: merchant::find_merchant(text),
        total_amount: total::find_total(text),
    };

    log::debug!(
        "Parsed fields: date={} merchant={} total={}",
        fields.purchased_at.is_some(),
        fields.merchant_name.is_some(),
        fields.total_amount.is_some()
    );

    fields
}
