// Free-running production chains driven by the resource pool timer

use serde::{Deserialize, Serialize};

use crate::production::Recipe;
use crate::types::{Millis, ResourceBundle};

/// Runtime pairing of a recipe with a timer and speed multiplier.
///
/// A chain fires when more than `interval / efficiency` has elapsed since its
/// last run, so `efficiency` speeds the timer rather than scaling amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionChain {
    pub recipe: Recipe,
    pub efficiency: f64,
    pub last_production_time: Millis,
    pub active: bool,
    /// Completed cycles since registration
    pub runs: u64,
}

impl ProductionChain {
    pub fn new(recipe: Recipe, now: Millis) -> Self {
        Self {
            recipe,
            efficiency: 1.0,
            last_production_time: now,
            active: true,
            runs: 0,
        }
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Effective cycle length, `None` when the chain can never fire
    pub fn effective_interval(&self) -> Option<Millis> {
        if self.efficiency <= 0.0 || self.recipe.interval <= 0.0 {
            return None;
        }
        Some(self.recipe.interval / self.efficiency)
    }

    pub fn is_due(&self, now: Millis) -> bool {
        self.active
            && self
                .effective_interval()
                .is_some_and(|interval| now - self.last_production_time > interval)
    }

    pub fn per_minute(&self) -> ResourceBundle {
        if !self.active {
            return ResourceBundle::new();
        }
        self.recipe.per_minute(self.efficiency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well() -> Recipe {
        Recipe::new(4000.0).with_output("water", 5.0)
    }

    #[test]
    fn test_due_is_strictly_after_interval() {
        let chain = ProductionChain::new(well(), 0.0);
        assert!(!chain.is_due(4000.0));
        assert!(chain.is_due(4000.1));
    }

    #[test]
    fn test_efficiency_speeds_timer() {
        let chain = ProductionChain::new(well(), 0.0).with_efficiency(2.0);
        assert_eq!(chain.effective_interval(), Some(2000.0));
        assert!(chain.is_due(2500.0));
    }

    #[test]
    fn test_inactive_or_zero_efficiency_never_due() {
        let mut chain = ProductionChain::new(well(), 0.0);
        chain.active = false;
        assert!(!chain.is_due(1.0e9));
        assert!(chain.per_minute().is_empty());

        let stalled = ProductionChain::new(well(), 0.0).with_efficiency(0.0);
        assert!(!stalled.is_due(1.0e9));
    }
}
