// Per-class happiness: housing density, market sentiment and a constant base

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ClassTable, DemandId};

pub const MAX_HAPPINESS: f64 = 100.0;
/// Market factor before any consumption has been observed
pub const NEUTRAL_MARKET: f64 = 50.0;
/// Market impact points per point of market factor offset
pub const MARKET_IMPACT_SCALE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HappinessWeights {
    pub housing: f64,
    pub market: f64,
    pub base: f64,
}

impl Default for HappinessWeights {
    fn default() -> Self {
        Self {
            housing: 0.4,
            market: 0.4,
            base: 0.2,
        }
    }
}

impl HappinessWeights {
    pub fn sum(&self) -> f64 {
        self.housing + self.market + self.base
    }
}

/// Occupancy a class tolerates before housing happiness drops, and how fast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HousingComfort {
    pub comfortable_density: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HappinessConfig {
    pub weights: HappinessWeights,
    pub base_value: f64,
    pub market_blend: f64,
    pub overall_blend: f64,
    pub comfort: ClassTable<HousingComfort>,
    /// Happiness attributed to newly added population
    pub incoming_happiness: f64,
}

impl Default for HappinessConfig {
    fn default() -> Self {
        Self {
            weights: HappinessWeights::default(),
            base_value: 60.0,
            market_blend: 0.2,
            overall_blend: 0.05,
            comfort: ClassTable::new(
                HousingComfort {
                    comfortable_density: 0.9,
                    penalty: 150.0,
                },
                HousingComfort {
                    comfortable_density: 0.8,
                    penalty: 200.0,
                },
                HousingComfort {
                    comfortable_density: 0.6,
                    penalty: 300.0,
                },
            ),
            incoming_happiness: 80.0,
        }
    }
}

/// Outcome of one consumption demand for one class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandSatisfaction {
    pub satisfaction: f64,
    pub price_score: f64,
    pub impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HappinessFactors {
    pub housing: f64,
    pub market: f64,
    pub base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassState {
    pub happiness: f64,
    pub factors: HappinessFactors,
    pub demand_satisfaction: BTreeMap<DemandId, DemandSatisfaction>,
    pub housing_capacity: u32,
}

impl ClassState {
    pub fn new(config: &HappinessConfig, housing_capacity: u32) -> Self {
        let mut state = Self {
            happiness: 0.0,
            factors: HappinessFactors {
                housing: MAX_HAPPINESS,
                market: NEUTRAL_MARKET,
                base: config.base_value,
            },
            demand_satisfaction: BTreeMap::new(),
            housing_capacity,
        };
        state.refresh(&config.weights);
        state
    }

    /// Recompute happiness from the factors
    pub fn refresh(&mut self, weights: &HappinessWeights) {
        let f = &self.factors;
        self.happiness = (f.housing * weights.housing + f.market * weights.market + f.base * weights.base)
            .clamp(0.0, MAX_HAPPINESS);
    }

    /// Population per housing slot, infinite when people have no housing
    pub fn density(&self, population: u32) -> f64 {
        if population == 0 {
            0.0
        } else if self.housing_capacity == 0 {
            f64::INFINITY
        } else {
            population as f64 / self.housing_capacity as f64
        }
    }

    pub fn is_overcrowded(&self, population: u32) -> bool {
        self.density(population) > 1.0
    }

    pub fn update_housing(&mut self, population: u32, comfort: &HousingComfort) {
        self.factors.housing = housing_score(self.density(population), comfort);
    }

    /// Blend the market factor toward the target implied by `impact`.
    pub fn apply_market_impact(&mut self, impact: f64, blend: f64) {
        let target = market_target(impact);
        self.factors.market += (target - self.factors.market) * blend.clamp(0.0, 1.0);
        self.factors.market = self.factors.market.clamp(0.0, MAX_HAPPINESS);
    }

    /// Mix newcomers into the market sentiment, weighted by head count.
    pub fn absorb_population(&mut self, existing: u32, incoming: u32, incoming_happiness: f64) {
        let total = existing as f64 + incoming as f64;
        if incoming == 0 || total <= 0.0 {
            return;
        }
        self.factors.market = ((self.factors.market * existing as f64
            + incoming_happiness * incoming as f64)
            / total)
            .clamp(0.0, MAX_HAPPINESS);
    }
}

/// 100 up to the comfortable density, then falling linearly by `penalty`.
pub fn housing_score(density: f64, comfort: &HousingComfort) -> f64 {
    if density <= comfort.comfortable_density {
        return MAX_HAPPINESS;
    }
    (MAX_HAPPINESS - (density - comfort.comfortable_density) * comfort.penalty).clamp(0.0, MAX_HAPPINESS)
}

pub fn market_target(impact: f64) -> f64 {
    (NEUTRAL_MARKET + impact * MARKET_IMPACT_SCALE).clamp(0.0, MAX_HAPPINESS)
}

/// Population-weighted mean of class happiness, `None` with no population.
pub fn weighted_happiness(classes: &ClassTable<ClassState>, populations: &ClassTable<u32>) -> Option<f64> {
    let total: u32 = populations.iter().map(|(_, n)| *n).sum();
    if total == 0 {
        return None;
    }
    let sum: f64 = classes
        .iter()
        .map(|(class, state)| state.happiness * *populations.get(class) as f64)
        .sum();
    Some((sum / total as f64).clamp(0.0, MAX_HAPPINESS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comfort() -> HousingComfort {
        HousingComfort {
            comfortable_density: 0.8,
            penalty: 200.0,
        }
    }

    #[test]
    fn test_housing_score_drops_past_comfort() {
        assert_eq!(housing_score(0.5, &comfort()), 100.0);
        assert!((housing_score(1.0, &comfort()) - 60.0).abs() < 1e-9);
        assert_eq!(housing_score(f64::INFINITY, &comfort()), 0.0);
    }

    #[test]
    fn test_upper_class_punished_harder() {
        let config = HappinessConfig::default();
        let density = 1.0;
        let lower = housing_score(density, &config.comfort.lower);
        let upper = housing_score(density, &config.comfort.upper);
        assert!(upper < lower);
    }

    #[test]
    fn test_initial_state_weighted_sum() {
        let config = HappinessConfig::default();
        let state = ClassState::new(&config, 10);
        // 0.4 * 100 + 0.4 * 50 + 0.2 * 60
        assert!((state.happiness - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_blend_moves_toward_target() {
        let mut state = ClassState::new(&HappinessConfig::default(), 10);
        state.apply_market_impact(20.0, 0.2);
        assert!((state.factors.market - 60.0).abs() < 1e-9);

        for _ in 0..200 {
            state.apply_market_impact(-40.0, 0.2);
        }
        assert!(state.factors.market >= 0.0 && state.factors.market < 1e-6);
    }

    #[test]
    fn test_absorb_population_weighted() {
        let mut state = ClassState::new(&HappinessConfig::default(), 10);
        state.factors.market = 20.0;
        state.absorb_population(30, 10, 80.0);
        assert!((state.factors.market - 35.0).abs() < 1e-9);

        // First arrivals take the incoming value outright
        state.absorb_population(0, 5, 80.0);
        assert_eq!(state.factors.market, 80.0);
    }

    #[test]
    fn test_weighted_happiness() {
        let config = HappinessConfig::default();
        let mut classes = ClassTable::new(
            ClassState::new(&config, 0),
            ClassState::new(&config, 0),
            ClassState::new(&config, 0),
        );
        classes.lower.happiness = 40.0;
        classes.middle.happiness = 80.0;
        classes.upper.happiness = 100.0;
        let overall = weighted_happiness(&classes, &ClassTable::new(3, 1, 0)).unwrap();
        assert!((overall - 50.0).abs() < 1e-9);
        assert!(weighted_happiness(&classes, &ClassTable::splat(0)).is_none());
    }
}
