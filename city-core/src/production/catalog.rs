// Building type catalog: the static data the core reads when constructing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    BuildingTypeId, Priority, ProfessionId, Quantity, ResourceBundle, ResourceId, SocialClass,
    WorkerRequirement,
};

use super::recipe::Recipe;

pub const DEFAULT_MAX_LEVEL: u32 = 5;

fn default_max_level() -> u32 {
    DEFAULT_MAX_LEVEL
}

/// Housing a building provides to one social class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HousingDef {
    pub class: SocialClass,
    pub capacity: u32,
}

/// Static definition of a building type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: BuildingTypeId,
    pub name: String,
    #[serde(default)]
    pub recipe: Option<Recipe>,
    /// Construction cost, also the base of upgrade costs
    #[serde(default)]
    pub cost: ResourceBundle,
    #[serde(default)]
    pub workers: WorkerRequirement,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub housing: Option<HousingDef>,
    /// Runs as a free timer chain in the resource pool, needs no workers
    #[serde(default)]
    pub passive: bool,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
}

impl BuildingDef {
    pub fn new(id: impl Into<BuildingTypeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            recipe: None,
            cost: ResourceBundle::new(),
            workers: WorkerRequirement::new(),
            priority: Priority::Medium,
            housing: None,
            passive: false,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }

    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = Some(recipe);
        self
    }

    pub fn with_cost(mut self, resource: impl Into<ResourceId>, qty: Quantity) -> Self {
        self.cost.insert(resource.into(), qty);
        self
    }

    pub fn with_workers(mut self, profession: impl Into<ProfessionId>, count: u32) -> Self {
        self.workers.insert(profession.into(), count);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_housing(mut self, class: SocialClass, capacity: u32) -> Self {
        self.housing = Some(HousingDef { class, capacity });
        self
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub fn total_workers(&self) -> u32 {
        self.workers.values().sum()
    }
}

/// Read-only lookup of building definitions by type id
#[derive(Debug, Clone, Default)]
pub struct BuildingCatalog {
    defs: BTreeMap<BuildingTypeId, BuildingDef>,
}

impl BuildingCatalog {
    pub fn new(defs: impl IntoIterator<Item = BuildingDef>) -> Self {
        Self {
            defs: defs.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BuildingDef> {
        self.defs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Building types of the default city
pub fn default_building_defs() -> Vec<BuildingDef> {
    vec![
        BuildingDef::new("farm", "Farm")
            .with_recipe(Recipe::new(6000.0).with_output("food", 8.0))
            .with_cost("wood", 20.0)
            .with_workers("farmer", 4)
            .with_priority(Priority::High),
        BuildingDef::new("lumber_mill", "Lumber Mill")
            .with_recipe(Recipe::new(5000.0).with_output("wood", 5.0))
            .with_cost("wood", 20.0)
            .with_cost("stone", 10.0)
            .with_workers("laborer", 4),
        BuildingDef::new("quarry", "Quarry")
            .with_recipe(Recipe::new(5000.0).with_output("stone", 4.0))
            .with_cost("wood", 30.0)
            .with_workers("laborer", 4),
        BuildingDef::new("mine", "Mine")
            .with_recipe(Recipe::new(6000.0).with_output("ore", 3.0))
            .with_cost("wood", 40.0)
            .with_cost("stone", 20.0)
            .with_workers("miner", 3)
            .with_workers("laborer", 2),
        BuildingDef::new("sawmill", "Sawmill")
            .with_recipe(
                Recipe::new(6000.0)
                    .with_input("wood", 4.0)
                    .with_output("planks", 2.0),
            )
            .with_cost("wood", 30.0)
            .with_cost("stone", 10.0)
            .with_workers("laborer", 2),
        BuildingDef::new("bakery", "Bakery")
            .with_recipe(
                Recipe::new(5000.0)
                    .with_input("food", 4.0)
                    .with_output("bread", 3.0),
            )
            .with_cost("wood", 30.0)
            .with_cost("stone", 20.0)
            .with_workers("laborer", 2)
            .with_workers("artisan", 1)
            .with_priority(Priority::High),
        BuildingDef::new("smelter", "Smelter")
            .with_recipe(
                Recipe::new(8000.0)
                    .with_input("ore", 3.0)
                    .with_output("metal", 2.0),
            )
            .with_cost("stone", 50.0)
            .with_workers("laborer", 3)
            .with_workers("technician", 1),
        BuildingDef::new("workshop", "Workshop")
            .with_recipe(
                Recipe::new(10_000.0)
                    .with_input("metal", 2.0)
                    .with_input("planks", 1.0)
                    .with_output("tools", 1.0),
            )
            .with_cost("planks", 20.0)
            .with_cost("metal", 10.0)
            .with_workers("artisan", 2)
            .with_workers("technician", 1),
        BuildingDef::new("essence_extractor", "Essence Extractor")
            .with_recipe(
                Recipe::new(3000.0)
                    .with_input("ore", 2.0)
                    .with_output("essence", 1.0),
            )
            .with_cost("metal", 20.0)
            .with_cost("tools", 5.0)
            .with_workers("engineer", 1)
            .with_workers("scholar", 1)
            .with_priority(Priority::Low),
        BuildingDef::new("jeweler", "Jeweler")
            .with_recipe(
                Recipe::new(12_000.0)
                    .with_input("metal", 1.0)
                    .with_input("essence", 1.0)
                    .with_output("jewelry", 1.0),
            )
            .with_cost("stone", 40.0)
            .with_cost("metal", 20.0)
            .with_workers("artisan", 1)
            .with_workers("administrator", 1)
            .with_priority(Priority::Low),
        BuildingDef::new("well", "Well")
            .with_recipe(Recipe::new(4000.0).with_output("water", 5.0))
            .with_cost("stone", 10.0)
            .passive(),
        BuildingDef::new("cottage", "Cottage")
            .with_cost("wood", 20.0)
            .with_housing(SocialClass::Lower, 20),
        BuildingDef::new("townhouse", "Townhouse")
            .with_cost("wood", 30.0)
            .with_cost("planks", 10.0)
            .with_housing(SocialClass::Middle, 10),
        BuildingDef::new("manor", "Manor")
            .with_cost("stone", 40.0)
            .with_cost("metal", 10.0)
            .with_housing(SocialClass::Upper, 4),
    ]
}
