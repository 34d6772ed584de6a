//! Unit conversions for inventory totals.
//!
//! Inventories report annual totals in kTn (Gg) per year; the engine works
//! with grams per day and per-cell hourly amounts.

pub const GRAMS_PER_KTN: f64 = 1e9;
pub const DAYS_PER_YEAR: f64 = 365.0;
pub const HOURS_PER_YEAR: f64 = DAYS_PER_YEAR * 24.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_YEAR: f64 = HOURS_PER_YEAR * SECONDS_PER_HOUR;

/// Daily total (g day⁻¹) to kTn year⁻¹.
pub fn daily_to_ktn_year(daily: f64) -> f64 {
    daily * DAYS_PER_YEAR / GRAMS_PER_KTN
}

/// kTn year⁻¹ to g day⁻¹.
pub fn ktn_year_to_g_day(ktn_year: f64) -> f64 {
    ktn_year * GRAMS_PER_KTN / DAYS_PER_YEAR
}

/// kTn year⁻¹ to mol h⁻¹.
pub fn ktn_year_to_mol_hr(ktn_year: f64, molecular_weight: f64) -> f64 {
    ktn_year * GRAMS_PER_KTN / (HOURS_PER_YEAR * molecular_weight)
}

/// kTn year⁻¹ to mol s⁻¹.
pub fn ktn_year_to_mol_s(ktn_year: f64, molecular_weight: f64) -> f64 {
    ktn_year * GRAMS_PER_KTN / (SECONDS_PER_YEAR * molecular_weight)
}

/// kTn year⁻¹ to g s⁻¹.
pub fn ktn_year_to_g_s(ktn_year: f64) -> f64 {
    ktn_year * GRAMS_PER_KTN / SECONDS_PER_YEAR
}

/// kTn year⁻¹ to µg s⁻¹.
pub fn ktn_year_to_ug_s(ktn_year: f64) -> f64 {
    ktn_year_to_g_s(ktn_year) * 1e6
}
