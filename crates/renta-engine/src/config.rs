//! Pricing engine configuration

/// High-level knobs for the pricing engine.
///
/// Global fallbacks; per-property constraints from the `properties` table
/// override the floor/ceiling at request time.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Minimum nightly price when the property defines none
    pub default_floor_price: f64,
    /// Maximum nightly price when the property defines none
    pub default_ceiling_price: f64,
    /// Coarse step of the candidate price grid, in currency units
    pub price_step: f64,
    /// Price returned when no model-driven decision is possible
    pub fallback_price: f64,
    /// Hard cap on grid size; the main latency lever
    pub max_grid_points: usize,
    /// Fail the recommendation when its log append fails
    pub durable_logging: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_floor_price: 30.0,
            default_ceiling_price: 800.0,
            price_step: 5.0,
            fallback_price: 100.0,
            max_grid_points: 50,
            durable_logging: false,
        }
    }
}

impl PricingConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coarse grid step
    pub fn with_price_step(mut self, step: f64) -> Self {
        self.price_step = step;
        self
    }

    /// Set the fallback price
    pub fn with_fallback_price(mut self, price: f64) -> Self {
        self.fallback_price = price;
        self
    }

    /// Set the grid size cap
    pub fn with_max_grid_points(mut self, max: usize) -> Self {
        self.max_grid_points = max;
        self
    }

    /// Make recommendation logging failures fatal
    pub fn with_durable_logging(mut self, durable: bool) -> Self {
        self.durable_logging = durable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PricingConfig::default();
        assert_eq!(config.default_floor_price, 30.0);
        assert_eq!(config.default_ceiling_price, 800.0);
        assert_eq!(config.price_step, 5.0);
        assert_eq!(config.fallback_price, 100.0);
        assert_eq!(config.max_grid_points, 50);
        assert!(!config.durable_logging);
    }

    #[test]
    fn test_builders() {
        let config = PricingConfig::new()
            .with_price_step(10.0)
            .with_max_grid_points(25)
            .with_durable_logging(true);
        assert_eq!(config.price_step, 10.0);
        assert_eq!(config.max_grid_points, 25);
        assert!(config.durable_logging);
    }
}
