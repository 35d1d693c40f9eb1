//! Order records written at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::line_item::LineItem;
use super::price::Price;

/// One captured order: the cart snapshot plus buyer contact details.
///
/// Appended to an append-only order log at checkout; the `date` field
/// serializes as an ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Buyer name as entered on the checkout form.
    pub name: String,
    /// Buyer phone as entered on the checkout form.
    pub phone: String,
    /// Cart snapshot at the moment of capture.
    pub items: Vec<LineItem>,
    /// Sum of line totals at the moment of capture.
    pub total: Price,
    /// Capture timestamp.
    pub date: DateTime<Utc>,
}

impl OrderRecord {
    /// Capture an order now.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        items: Vec<LineItem>,
        total: Price,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            items,
            total,
            date: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SelectedOptions, VariantId};

    #[test]
    fn test_order_record_date_is_iso8601() {
        let record = OrderRecord {
            name: "Ada".to_string(),
            phone: "+1 555 0100".to_string(),
            items: vec![LineItem::new(
                VariantId::new("123"),
                SelectedOptions::new(),
                "Socks",
                "",
                Price::from_minor_units(500),
                "socks",
                "/products/socks",
                1,
            )],
            total: Price::from_minor_units(500),
            date: Utc::now(),
        };

        let json = serde_json::to_value(&record).expect("serialize");
        let date = json
            .get("date")
            .and_then(serde_json::Value::as_str)
            .expect("date is a string");
        // RFC 3339 / ISO-8601 shape: 2026-01-02T03:04:05
        assert!(date.contains('T'));
        assert!(date.starts_with("20"));

        let back: OrderRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(record, back);
    }
}
