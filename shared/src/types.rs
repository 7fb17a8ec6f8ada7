//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One feed bucket on a sale record, e.g. `{"type": "B1", "bags": 40}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedEntry {
    #[serde(rename = "type")]
    pub feed_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub bags: Decimal,
}

impl FeedEntry {
    pub fn new(feed_type: impl Into<String>, bags: Decimal) -> Self {
        Self {
            feed_type: feed_type.into(),
            bags,
        }
    }
}

/// Canonical form of a feed type code. Codes are free-form and compared
/// case-insensitively.
pub fn normalize_feed_type(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Merge entries that refer to the same feed type, keeping first-seen order.
pub fn merge_feed_entries(entries: &[FeedEntry]) -> Vec<FeedEntry> {
    let mut merged: Vec<FeedEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        let code = normalize_feed_type(&entry.feed_type);
        match merged.iter_mut().find(|e| e.feed_type == code) {
            Some(existing) => existing.bags += entry.bags,
            None => merged.push(FeedEntry::new(code, entry.bags)),
        }
    }
    merged
}

/// Total bags across all feed types
pub fn total_bags(entries: &[FeedEntry]) -> Decimal {
    entries.iter().map(|e| e.bags).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_feed_entries_case_insensitive() {
        let entries = vec![
            FeedEntry::new("b1", Decimal::from(10)),
            FeedEntry::new("B2", Decimal::from(5)),
            FeedEntry::new(" B1 ", Decimal::from(2)),
        ];
        let merged = merge_feed_entries(&entries);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], FeedEntry::new("B1", Decimal::from(12)));
        assert_eq!(merged[1], FeedEntry::new("B2", Decimal::from(5)));
    }

    #[test]
    fn test_total_bags() {
        let entries = vec![
            FeedEntry::new("B1", Decimal::new(125, 1)),
            FeedEntry::new("b2", Decimal::from(7)),
        ];
        assert_eq!(total_bags(&entries), Decimal::new(195, 1));
    }

    #[test]
    fn test_feed_entry_wire_format() {
        let entry: FeedEntry = serde_json::from_str(r#"{"type":"B1","bags":40}"#).unwrap();
        assert_eq!(entry.feed_type, "B1");
        assert_eq!(entry.bags, Decimal::from(40));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "B1");
        assert!(json["bags"].is_number());
    }
}
