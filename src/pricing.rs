//! Price-per-litre generation
//!
//! Each pump session runs at a price drawn uniformly from a configured
//! range. The draw is truncated (never rounded up) to whole pence so the
//! advertised rate cannot exceed the configured maximum.

use crate::config::PumpConfig;
use rand::Rng;

/// Inclusive price range a session price is drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn from_config(config: &PumpConfig) -> Self {
        Self::new(config.min_price_per_litre, config.max_price_per_litre)
    }

    /// Draw a price from a caller-supplied generator
    pub fn roll_with<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let unit: f64 = rng.r#gen();
        self.price_at(unit)
    }

    /// Price at a point `unit` in `[0, 1)` across the range, truncated to 2 decimals
    pub fn price_at(&self, unit: f64) -> f64 {
        let raw = self.min + unit * (self.max - self.min);
        let truncated = truncate_to_cents(raw);
        // A minimum with sub-cent digits would otherwise truncate below the range
        truncated.max(self.min).min(self.max)
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Truncate toward zero at two decimal places
///
/// A tiny epsilon absorbs binary representation error so that a value that
/// is exactly 1.45 in decimal is not truncated to 1.44.
pub fn truncate_to_cents(value: f64) -> f64 {
    ((value * 100.0) + 1e-9).trunc() / 100.0
}
