//! WebAssembly module for the Broiler Cycle Ledger
//!
//! Provides client-side computation for:
//! - Cycle metrics (FCR, EPI, settlement rate, profit)
//! - Feed intake targets
//! - Offline validation of a sale before it is submitted

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{
    effective_rate, plan_sale, CycleMetrics, FeedSchedule, MortalityFloor, PricingPolicy,
    SaleFigures, SaleRequest,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("broiler cycle ledger calculators ready"));
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, JsValue> {
    Decimal::try_from(value).map_err(|_| JsValue::from_str(&format!("Invalid number for {}", field)))
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

/// Figures of a finished cycle as entered in the browser
#[derive(Debug, Deserialize)]
struct MetricsInput {
    doc: i32,
    mortality: i32,
    age: i32,
    feed_bags: Decimal,
    sales: Vec<SaleFigures>,
    #[serde(default)]
    pricing: Option<PricingPolicy>,
}

impl CycleSnapshot for MetricsInput {
    fn doc(&self) -> i32 {
        self.doc
    }
    fn mortality(&self) -> i32 {
        self.mortality
    }
    fn birds_sold(&self) -> i32 {
        self.doc - self.mortality
    }
    fn age(&self) -> i32 {
        self.age
    }
    fn intake(&self) -> Decimal {
        self.feed_bags
    }
}

fn metrics_for(input: &MetricsInput) -> CycleMetrics {
    let policy = input.pricing.clone().unwrap_or_default();
    CycleMetrics::compute(input, &input.sales, &policy)
}

/// Compute the metrics of a finished cycle. Takes and returns JSON.
#[wasm_bindgen]
pub fn calculate_cycle_metrics(input_json: &str) -> Result<String, JsValue> {
    let input: MetricsInput =
        serde_json::from_str(input_json).map_err(|e| js_error("Invalid metrics JSON", e))?;
    serde_json::to_string(&metrics_for(&input)).map_err(|e| js_error("Serialization failed", e))
}

/// Feed conversion ratio for `feed_bags` bags and `total_weight_kg` of live weight
#[wasm_bindgen]
pub fn calculate_fcr(feed_bags: f64, total_weight_kg: f64) -> Result<f64, JsValue> {
    let policy = PricingPolicy::default();
    let feed = shared::feed_kg(to_decimal(feed_bags, "feed_bags")?, policy.bag_weight_kg);
    Ok(to_f64(shared::fcr(feed, to_decimal(total_weight_kg, "total_weight_kg")?)))
}

/// Settlement rate per kg for a list of sale prices
#[wasm_bindgen]
pub fn calculate_effective_rate(prices: Vec<f64>) -> Result<f64, JsValue> {
    let prices = prices
        .into_iter()
        .map(|p| to_decimal(p, "price"))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(to_f64(effective_rate(&prices, PricingPolicy::default().base_price)))
}

/// Modelled cumulative feed bags. `schedule_json` is the organization's daily
/// grams-per-bird list; the default curve is used when it is empty.
#[wasm_bindgen]
pub fn target_feed_intake(doc: i32, mortality: i32, age: i32, schedule_json: &str) -> f64 {
    let value = serde_json::from_str::<serde_json::Value>(schedule_json).ok();
    let schedule = FeedSchedule::from_config(value.as_ref());
    to_f64(schedule.target_intake(shared::feeding_population(doc, mortality), age))
}

/// Age in days today of a cycle that started on `start_date` (YYYY-MM-DD)
#[wasm_bindgen]
pub fn cycle_age_today(start_date: &str) -> Result<i32, JsValue> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|e| js_error("Invalid start date", e))?;
    let now = js_sys::Date::new_0();
    let today = NaiveDate::from_ymd_opt(
        now.get_full_year() as i32,
        now.get_month() + 1,
        now.get_date(),
    )
    .ok_or_else(|| JsValue::from_str("Invalid browser date"))?;
    Ok(age_on(start, today))
}

/// Result of checking a sale against a cycle before submitting it
#[derive(Debug, Serialize)]
struct SalePreview {
    house_birds: i32,
    mortality: i32,
    birds_sold: i32,
    closes_cycle: bool,
    final_intake_bags: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct SalePreviewInput {
    cycle: Cycle,
    birds_sold: i32,
    #[serde(default)]
    mortality_change: i32,
    total_weight: Decimal,
    price_per_kg: Decimal,
    #[serde(default)]
    feed_consumed: Vec<FeedEntry>,
    sale_date: NaiveDate,
    #[serde(default)]
    mortality_floor: i32,
}

fn preview(input: SalePreviewInput) -> Result<SalePreview, String> {
    let request = SaleRequest {
        birds_sold: input.birds_sold,
        mortality_change: input.mortality_change,
        total_mortality: None,
        total_weight: input.total_weight,
        price_per_kg: input.price_per_kg,
        feed_consumed: merge_feed_entries(&input.feed_consumed),
        sale_date: input.sale_date,
    };
    let plan = plan_sale(&input.cycle, &request, MortalityFloor(input.mortality_floor))
        .map_err(|e| e.to_string())?;
    Ok(SalePreview {
        house_birds: plan.house_birds,
        mortality: plan.counters.mortality,
        birds_sold: plan.counters.birds_sold,
        closes_cycle: plan.closes_cycle(),
        final_intake_bags: plan.close_with.map(|f| f.bags()),
    })
}

/// Validate a sale offline with the same rules the server applies. Returns the
/// preview as JSON or throws the rejection message.
#[wasm_bindgen]
pub fn preview_sale(input_json: &str) -> Result<String, JsValue> {
    let input: SalePreviewInput =
        serde_json::from_str(input_json).map_err(|e| js_error("Invalid sale JSON", e))?;
    let result = preview(input).map_err(|e| JsValue::from_str(&e))?;
    serde_json::to_string(&result).map_err(|e| js_error("Serialization failed", e))
}
