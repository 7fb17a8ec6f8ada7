//! Validation utilities for the Broiler Cycle Ledger
//!
//! Field-level checks shared by the backend request handlers and the browser
//! bindings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::FeedEntry;

/// Largest placement accepted for a single cycle
pub const MAX_DOC: i32 = 1_000_000;

/// Longest grow-out accepted, in days
pub const MAX_AGE_DAYS: i32 = 120;

/// Feed bag quantities are stored with two decimals
pub const BAG_DECIMALS: u32 = 2;

/// Heaviest single sale accepted, in kg
pub const MAX_SALE_WEIGHT_KG: Decimal = dec!(5000000);

/// Highest sale price accepted per kg
pub const MAX_PRICE_PER_KG: Decimal = dec!(1000000);

// ============================================================================
// Cycle Validations
// ============================================================================

/// Validate a cycle or farmer display name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required");
    }
    if trimmed.chars().count() > 100 {
        return Err("Name must be at most 100 characters");
    }
    Ok(())
}

/// Validate the day-old chick count of a placement
pub fn validate_doc(doc: i32) -> Result<(), &'static str> {
    if doc < 1 {
        return Err("DOC must be at least 1");
    }
    if doc > MAX_DOC {
        return Err("DOC exceeds the maximum placement size");
    }
    Ok(())
}

/// Validate the age of a cycle in days
pub fn validate_age(age: i32) -> Result<(), &'static str> {
    if age < 0 {
        return Err("Age cannot be negative");
    }
    if age > MAX_AGE_DAYS {
        return Err("Age exceeds the maximum grow-out period");
    }
    Ok(())
}

/// Validate a free-text reason attached to a correction
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("A reason is required for corrections");
    }
    Ok(())
}

// ============================================================================
// Feed Validations
// ============================================================================

/// Validate a feed type code (short code such as "B1", "S2")
pub fn validate_feed_type_code(code: &str) -> Result<(), &'static str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err("Feed type is required");
    }
    if trimmed.len() > 16 {
        return Err("Feed type must be at most 16 characters");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Feed type must be alphanumeric");
    }
    Ok(())
}

/// Validate a list of feed entries
pub fn validate_feed_entries(entries: &[FeedEntry]) -> Result<(), &'static str> {
    for entry in entries {
        validate_feed_type_code(&entry.feed_type)?;
        if entry.bags < Decimal::ZERO {
            return Err("Feed bags cannot be negative");
        }
        if entry.bags.normalize().scale() > BAG_DECIMALS {
            return Err("Feed bags allow at most two decimal places");
        }
    }
    Ok(())
}

/// Validate a feed bag quantity for stock movements
pub fn validate_bags(bags: Decimal) -> Result<(), &'static str> {
    if bags <= Decimal::ZERO {
        return Err("Bags must be positive");
    }
    if bags.normalize().scale() > BAG_DECIMALS {
        return Err("Bags allow at most two decimal places");
    }
    Ok(())
}

// ============================================================================
// Contact Validations
// ============================================================================

/// Validate a phone number (7 to 15 digits, optional leading +)
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = body.chars().filter(|c| c.is_ascii_digit()).collect();
    if body
        .chars()
        .any(|c| !(c.is_ascii_digit() || c == '-' || c == ' '))
    {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    if digits.len() < 7 || digits.len() > 15 {
        return Err("Phone number must have 7 to 15 digits");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Batch 12").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_doc() {
        assert!(validate_doc(1).is_ok());
        assert!(validate_doc(5000).is_ok());
        assert!(validate_doc(0).is_err());
        assert!(validate_doc(-3).is_err());
        assert!(validate_doc(MAX_DOC + 1).is_err());
    }

    #[test]
    fn test_validate_age() {
        assert!(validate_age(0).is_ok());
        assert!(validate_age(35).is_ok());
        assert!(validate_age(-1).is_err());
        assert!(validate_age(MAX_AGE_DAYS + 1).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("hatchery recount").is_ok());
        assert!(validate_reason("").is_err());
    }

    #[test]
    fn test_validate_feed_type_code() {
        assert!(validate_feed_type_code("B1").is_ok());
        assert!(validate_feed_type_code("starter-2").is_ok());
        assert!(validate_feed_type_code("").is_err());
        assert!(validate_feed_type_code("B 1").is_err());
        assert!(validate_feed_type_code(&"B".repeat(17)).is_err());
    }

    #[test]
    fn test_validate_feed_entries() {
        let ok = vec![FeedEntry::new("B1", Decimal::from(3))];
        assert!(validate_feed_entries(&ok).is_ok());
        let negative = vec![FeedEntry::new("B1", Decimal::from(-1))];
        assert!(validate_feed_entries(&negative).is_err());
        assert!(validate_feed_entries(&[]).is_ok());
        let fractional = vec![FeedEntry::new("B1", dec!(2.125))];
        assert!(validate_feed_entries(&fractional).is_err());
    }

    #[test]
    fn test_validate_bags() {
        assert!(validate_bags(Decimal::new(5, 1)).is_ok());
        assert!(validate_bags(Decimal::ZERO).is_err());
        assert!(validate_bags(dec!(40.125)).is_err());
        // Trailing zeros are not extra precision
        assert!(validate_bags(dec!(40.100)).is_ok());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+880 1711-000000").is_ok());
        assert!(validate_phone("0812345678").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("phone").is_err());
    }
}
