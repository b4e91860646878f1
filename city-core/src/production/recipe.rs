// Recipe definitions for production chains

use serde::{Deserialize, Serialize};

use crate::types::{Millis, Quantity, ResourceBundle, ResourceId};

// ============================================================================
// Recipe
// ============================================================================

/// A recipe converts an input bundle into an output bundle once per interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub inputs: ResourceBundle,
    #[serde(default)]
    pub outputs: ResourceBundle,
    /// Production cycle length in simulated milliseconds
    pub interval: Millis,
}

impl Recipe {
    pub fn new(interval: Millis) -> Self {
        Self {
            inputs: ResourceBundle::new(),
            outputs: ResourceBundle::new(),
            interval,
        }
    }

    pub fn with_input(mut self, resource: impl Into<ResourceId>, qty: Quantity) -> Self {
        self.inputs.insert(resource.into(), qty);
        self
    }

    pub fn with_output(mut self, resource: impl Into<ResourceId>, qty: Quantity) -> Self {
        self.outputs.insert(resource.into(), qty);
        self
    }

    /// Multiply every output amount. Used by building upgrades.
    pub fn scale_outputs(&mut self, factor: f64) {
        for qty in self.outputs.values_mut() {
            *qty *= factor;
        }
    }

    /// Resources this recipe touches, inputs first
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.inputs.keys().chain(self.outputs.keys())
    }

    /// Per-minute output estimate at the given speed multiplier
    pub fn per_minute(&self, efficiency: f64) -> ResourceBundle {
        if self.interval <= 0.0 {
            return ResourceBundle::new();
        }
        self.outputs
            .iter()
            .map(|(resource, qty)| {
                (
                    resource.clone(),
                    qty * 60_000.0 / self.interval * efficiency,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_builder() {
        let recipe = Recipe::new(3000.0)
            .with_input("ore", 2.0)
            .with_output("essence", 1.0);

        assert_eq!(recipe.interval, 3000.0);
        assert_eq!(recipe.inputs.get("ore"), Some(&2.0));
        assert_eq!(recipe.outputs.get("essence"), Some(&1.0));
        assert_eq!(recipe.resources().count(), 2);
    }

    #[test]
    fn test_scale_outputs_leaves_inputs() {
        let mut recipe = Recipe::new(1000.0)
            .with_input("wood", 4.0)
            .with_output("planks", 2.0);
        recipe.scale_outputs(1.2);

        assert_eq!(recipe.inputs.get("wood"), Some(&4.0));
        assert!((recipe.outputs["planks"] - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_per_minute_rate() {
        let recipe = Recipe::new(3000.0).with_output("essence", 1.0);
        // 20 cycles per minute at full speed, 10 at half
        assert_eq!(recipe.per_minute(1.0)["essence"], 20.0);
        assert_eq!(recipe.per_minute(0.5)["essence"], 10.0);
        assert!(Recipe::new(0.0).with_output("x", 1.0).per_minute(1.0).is_empty());
    }
}
