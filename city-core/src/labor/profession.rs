// Worker professions and their promotion ladders

use serde::{Deserialize, Serialize};

use crate::types::{ProfessionId, Quantity, ResourceBundle, ResourceId, SocialClass};

/// Static definition of a profession
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionDef {
    pub id: ProfessionId,
    pub class: SocialClass,
    #[serde(default = "default_multiplier")]
    pub production_multiplier: f64,
    #[serde(default)]
    pub initial_count: u32,
    #[serde(default)]
    pub promotes_to: Option<ProfessionId>,
    /// Experience needed before a promotion roll
    #[serde(default)]
    pub promotion_threshold: f64,
    /// Minimum overall happiness for a promotion roll
    #[serde(default)]
    pub required_happiness: f64,
    #[serde(default)]
    pub promotion_chance: f64,
    /// Resources spent per promoted worker
    #[serde(default)]
    pub promotion_cost: ResourceBundle,
    /// Share of free workers moved by one promotion or demotion
    #[serde(default = "default_batch_fraction")]
    pub batch_fraction: f64,
    #[serde(default)]
    pub demotes_to: Option<ProfessionId>,
    #[serde(default)]
    pub demotion_chance: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_batch_fraction() -> f64 {
    0.1
}

impl ProfessionDef {
    pub fn new(id: impl Into<ProfessionId>, class: SocialClass) -> Self {
        Self {
            id: id.into(),
            class,
            production_multiplier: 1.0,
            initial_count: 0,
            promotes_to: None,
            promotion_threshold: 0.0,
            required_happiness: 0.0,
            promotion_chance: 0.0,
            promotion_cost: ResourceBundle::new(),
            batch_fraction: default_batch_fraction(),
            demotes_to: None,
            demotion_chance: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.production_multiplier = multiplier;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.initial_count = count;
        self
    }

    pub fn promotes_to(
        mut self,
        target: impl Into<ProfessionId>,
        threshold: f64,
        required_happiness: f64,
        chance: f64,
    ) -> Self {
        self.promotes_to = Some(target.into());
        self.promotion_threshold = threshold;
        self.required_happiness = required_happiness;
        self.promotion_chance = chance;
        self
    }

    pub fn with_promotion_cost(mut self, resource: impl Into<ResourceId>, qty: Quantity) -> Self {
        self.promotion_cost.insert(resource.into(), qty);
        self
    }

    pub fn demotes_to(mut self, target: impl Into<ProfessionId>, chance: f64) -> Self {
        self.demotes_to = Some(target.into());
        self.demotion_chance = chance;
        self
    }
}

/// Runtime state of one profession
#[derive(Debug, Clone, PartialEq)]
pub struct Profession {
    pub def: ProfessionDef,
    pub count: u32,
    /// Workers committed to building allocations, never above `count`
    pub assigned: u32,
    pub experience: f64,
}

impl Profession {
    pub fn new(def: ProfessionDef) -> Self {
        Self {
            count: def.initial_count,
            assigned: 0,
            experience: 0.0,
            def,
        }
    }

    pub fn id(&self) -> &ProfessionId {
        &self.def.id
    }

    pub fn class(&self) -> SocialClass {
        self.def.class
    }

    pub fn free(&self) -> u32 {
        self.count.saturating_sub(self.assigned)
    }

    /// Workers moved by one promotion or demotion step
    pub fn batch_size(&self) -> u32 {
        let free = self.free();
        if free == 0 {
            return 0;
        }
        ((free as f64 * self.def.batch_fraction).floor() as u32).clamp(1, free)
    }
}

/// Professions of the default city, three per class
pub fn default_profession_defs() -> Vec<ProfessionDef> {
    vec![
        ProfessionDef::new("laborer", SocialClass::Lower)
            .with_count(40)
            .promotes_to("miner", 600.0, 50.0, 0.3)
            .with_promotion_cost("tools", 0.5),
        ProfessionDef::new("farmer", SocialClass::Lower).with_count(20),
        ProfessionDef::new("miner", SocialClass::Lower)
            .with_multiplier(1.2)
            .with_count(10)
            .demotes_to("laborer", 0.1),
        ProfessionDef::new("clerk", SocialClass::Middle)
            .with_multiplier(1.1)
            .with_count(10)
            .promotes_to("technician", 800.0, 60.0, 0.25)
            .with_promotion_cost("tools", 1.0),
        ProfessionDef::new("technician", SocialClass::Middle)
            .with_multiplier(1.3)
            .with_count(5)
            .demotes_to("clerk", 0.08),
        ProfessionDef::new("artisan", SocialClass::Middle)
            .with_multiplier(1.2)
            .with_count(5),
        ProfessionDef::new("scholar", SocialClass::Upper)
            .with_multiplier(1.3)
            .with_count(3)
            .promotes_to("engineer", 1000.0, 70.0, 0.2)
            .with_promotion_cost("essence", 1.0),
        ProfessionDef::new("engineer", SocialClass::Upper)
            .with_multiplier(1.5)
            .with_count(2)
            .demotes_to("scholar", 0.05),
        ProfessionDef::new("administrator", SocialClass::Upper)
            .with_multiplier(1.4)
            .with_count(1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_and_batch() {
        let mut prof = Profession::new(ProfessionDef::new("laborer", SocialClass::Lower).with_count(40));
        prof.assigned = 15;
        assert_eq!(prof.free(), 25);
        // 10% of 25 floors to 2
        assert_eq!(prof.batch_size(), 2);

        prof.assigned = 39;
        assert_eq!(prof.batch_size(), 1);
        prof.assigned = 40;
        assert_eq!(prof.batch_size(), 0);
    }

    #[test]
    fn test_default_ladders_stay_within_class() {
        let defs = default_profession_defs();
        let class_of = |id: &str| defs.iter().find(|d| d.id == id).map(|d| d.class);
        for def in &defs {
            for target in def.promotes_to.iter().chain(def.demotes_to.iter()) {
                assert_eq!(class_of(target), Some(def.class), "{} -> {}", def.id, target);
            }
        }
    }
}
