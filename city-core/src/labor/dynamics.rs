// Class-level population dynamics driven by happiness thresholds

use rand::Rng;

use crate::types::{ClassTable, SocialClass};

use super::LaborConfig;
use super::happiness::MAX_HAPPINESS;

/// One probabilistic population movement decided for a dynamics interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassShift {
    /// People leave the city
    Loss { class: SocialClass, amount: u32 },
    /// People drop to the class below
    Demotion { from: SocialClass, amount: u32 },
    /// People rise to the class above
    Mobility { from: SocialClass, amount: u32 },
    /// Newcomers join the lowest class
    Immigration { amount: u32 },
}

/// Chance that grows linearly from 0 at `threshold` to 1 at zero happiness.
pub fn chance_below(happiness: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 || happiness >= threshold {
        return 0.0;
    }
    ((threshold - happiness) / threshold).clamp(0.0, 1.0)
}

/// Chance that grows linearly from 0 at `threshold` to 1 at full happiness.
pub fn chance_above(happiness: f64, threshold: f64) -> f64 {
    if happiness < threshold || threshold >= MAX_HAPPINESS {
        return 0.0;
    }
    ((happiness - threshold) / (MAX_HAPPINESS - threshold)).clamp(0.0, 1.0)
}

/// `max(1, round(population * max_fraction * chance))`, never above `population`
pub fn scaled_amount(population: u32, max_fraction: f64, chance: f64) -> u32 {
    let amount = (population as f64 * max_fraction * chance).round() as u32;
    amount.max(1).min(population)
}

fn upward_threshold(config: &LaborConfig, class: SocialClass) -> Option<f64> {
    match class {
        SocialClass::Lower => Some(config.upward_threshold_lower),
        SocialClass::Middle => Some(config.upward_threshold_middle),
        SocialClass::Upper => None,
    }
}

/// Roll every class against the loss, demotion and mobility thresholds, then
/// roll immigration against overall happiness.
pub fn roll_class_dynamics(
    happiness: &ClassTable<f64>,
    populations: &ClassTable<u32>,
    overall: f64,
    config: &LaborConfig,
    rng: &mut impl Rng,
) -> Vec<ClassShift> {
    let mut shifts = Vec::new();

    for class in SocialClass::all() {
        let population = *populations.get(class);
        if population == 0 {
            continue;
        }
        let h = *happiness.get(class);

        let loss = chance_below(h, config.loss_threshold);
        if loss > 0.0 && rng.random::<f64>() < loss {
            shifts.push(ClassShift::Loss {
                class,
                amount: scaled_amount(population, config.max_loss_fraction, loss),
            });
        }

        if class.below().is_some() {
            let demotion = chance_below(h, config.demotion_threshold);
            if demotion > 0.0 && rng.random::<f64>() < demotion {
                shifts.push(ClassShift::Demotion {
                    from: class,
                    amount: scaled_amount(population, config.max_demotion_fraction, demotion),
                });
            }
        }

        if let Some(threshold) = upward_threshold(config, class) {
            let mobility = chance_above(h, threshold);
            if mobility > 0.0 && rng.random::<f64>() < mobility {
                shifts.push(ClassShift::Mobility {
                    from: class,
                    amount: scaled_amount(population, config.max_mobility_fraction, mobility),
                });
            }
        }
    }

    let total: u32 = populations.iter().map(|(_, n)| *n).sum();
    if total > 0 && overall > config.immigration_threshold {
        let chance = chance_above(overall, config.immigration_threshold);
        if chance > 0.0 && rng.random::<f64>() < chance {
            shifts.push(ClassShift::Immigration {
                amount: ((total as f64 * config.max_immigration_fraction * chance).round() as u32)
                    .max(1),
            });
        }
    }

    shifts
}
