//! Production metrics for finished cycles
//!
//! Pure functions over cycle snapshots and sale figures. The price smoothing
//! rule and the fixed prices are business policy; they must stay identical to
//! the figures already printed on farmer settlement sheets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::feed::FEED_BAG_KG;
use crate::models::CycleSnapshot;

/// Reference price per kg of live weight
pub const BASE_PRICE: Decimal = dec!(141);

/// Price charged to the farmer per feed bag
pub const FEED_PRICE: Decimal = dec!(3220);

/// Price charged per day-old chick
pub const DOC_PRICE: Decimal = dec!(41);

/// Prices used by the settlement formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub base_price: Decimal,
    pub feed_price_per_bag: Decimal,
    pub doc_price: Decimal,
    pub bag_weight_kg: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_price: BASE_PRICE,
            feed_price_per_bag: FEED_PRICE,
            doc_price: DOC_PRICE,
            bag_weight_kg: FEED_BAG_KG,
        }
    }
}

/// Weight and price of one sale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaleFigures {
    pub total_weight: Decimal,
    pub price_per_kg: Decimal,
}

/// Derived figures of a finished cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub survivors: i32,
    pub survival_rate: Decimal,
    pub feed_kg: Decimal,
    pub total_weight_kg: Decimal,
    pub fcr: Decimal,
    pub avg_weight_kg: Decimal,
    pub epi: Decimal,
    pub effective_rate: Decimal,
    pub formula_revenue: Decimal,
    pub production_cost: Decimal,
    pub profit: Decimal,
}

impl CycleMetrics {
    pub fn compute<C: CycleSnapshot + ?Sized>(
        cycle: &C,
        sales: &[SaleFigures],
        policy: &PricingPolicy,
    ) -> Self {
        let doc = cycle.doc();
        let survivors = doc - cycle.mortality();
        let feed_bags = cycle.intake();
        let total_weight_kg: Decimal = sales.iter().map(|s| s.total_weight).sum();

        let survival = survival_rate(doc, cycle.mortality());
        let feed = feed_kg(feed_bags, policy.bag_weight_kg);
        let fcr_value = fcr(feed, total_weight_kg);
        let avg = avg_weight_kg(total_weight_kg, survivors);
        let epi_value = epi(survival, avg, fcr_value, cycle.age());

        let prices: Vec<Decimal> = sales.iter().map(|s| s.price_per_kg).collect();
        let rate = effective_rate(&prices, policy.base_price);
        let revenue = total_weight_kg * rate;
        let cost = production_cost(feed_bags, doc, policy);

        Self {
            survivors,
            survival_rate: survival,
            feed_kg: feed,
            total_weight_kg,
            fcr: fcr_value,
            avg_weight_kg: avg,
            epi: epi_value,
            effective_rate: rate,
            formula_revenue: revenue,
            production_cost: cost,
            profit: revenue - cost,
        }
    }
}

/// Percentage of placed chicks that survived
pub fn survival_rate(doc: i32, mortality: i32) -> Decimal {
    if doc <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(doc - mortality) / Decimal::from(doc) * dec!(100)
}

pub fn feed_kg(feed_bags: Decimal, bag_weight_kg: Decimal) -> Decimal {
    feed_bags * bag_weight_kg
}

/// Feed conversion ratio: kg of feed per kg of live weight
pub fn fcr(feed_kg: Decimal, total_weight_kg: Decimal) -> Decimal {
    if total_weight_kg.is_zero() {
        Decimal::ZERO
    } else {
        feed_kg / total_weight_kg
    }
}

pub fn avg_weight_kg(total_weight_kg: Decimal, survivors: i32) -> Decimal {
    if survivors <= 0 {
        Decimal::ZERO
    } else {
        total_weight_kg / Decimal::from(survivors)
    }
}

/// European Production Index
pub fn epi(survival_rate: Decimal, avg_weight_kg: Decimal, fcr: Decimal, age: i32) -> Decimal {
    if fcr.is_zero() || age <= 0 {
        return Decimal::ZERO;
    }
    (survival_rate * avg_weight_kg) / (fcr * Decimal::from(age)) * dec!(100)
}

/// Settlement rate per kg. Prices above base add half of the surplus, prices
/// below base subtract the full deficit, and the result never drops below base.
pub fn effective_rate(prices: &[Decimal], base_price: Decimal) -> Decimal {
    let net_adjustment: Decimal = prices
        .iter()
        .map(|price| {
            if *price > base_price {
                (*price - base_price) / dec!(2)
            } else {
                *price - base_price
            }
        })
        .sum();
    (base_price + net_adjustment).max(base_price)
}

pub fn production_cost(feed_bags: Decimal, doc: i32, policy: &PricingPolicy) -> Decimal {
    feed_bags * policy.feed_price_per_bag + Decimal::from(doc) * policy.doc_price
}
