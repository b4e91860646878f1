// Economy configuration: tunables plus the static catalogs the core reads

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::labor::{HappinessConfig, LaborConfig, ProfessionDef, default_profession_defs};
use crate::market::{
    DemandDef, GoodDef, MarketConfig, ServiceDef, default_demand_defs, default_good_defs,
    default_service_defs,
};
use crate::production::{BuildingDef, default_building_defs};
use crate::resources::{ResourceDef, TierCaps};
use crate::types::{SocialClass, Tier};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub caps: TierCaps,
    pub resources: Vec<ResourceDef>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            caps: TierCaps::default(),
            resources: default_resource_defs(),
        }
    }
}

pub fn default_resource_defs() -> Vec<ResourceDef> {
    vec![
        ResourceDef::new("wood", Tier::Raw, 200.0),
        ResourceDef::new("stone", Tier::Raw, 150.0),
        ResourceDef::new("ore", Tier::Raw, 100.0),
        ResourceDef::new("food", Tier::Raw, 300.0),
        ResourceDef::new("water", Tier::Raw, 200.0),
        ResourceDef::new("planks", Tier::Processed, 0.0),
        ResourceDef::new("metal", Tier::Processed, 20.0),
        ResourceDef::new("bread", Tier::Processed, 50.0),
        ResourceDef::new("tools", Tier::Advanced, 10.0),
        ResourceDef::new("essence", Tier::Advanced, 0.0),
        ResourceDef::new("jewelry", Tier::EndProduct, 0.0),
    ]
}

/// Everything needed to build a `World`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub resources: ResourceConfig,
    pub labor: LaborConfig,
    pub happiness: HappinessConfig,
    pub market: MarketConfig,
    pub professions: Vec<ProfessionDef>,
    pub buildings: Vec<BuildingDef>,
    pub goods: Vec<GoodDef>,
    pub services: Vec<ServiceDef>,
    pub demands: Vec<DemandDef>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            resources: ResourceConfig::default(),
            labor: LaborConfig::default(),
            happiness: HappinessConfig::default(),
            market: MarketConfig::default(),
            professions: default_profession_defs(),
            buildings: default_building_defs(),
            goods: default_good_defs(),
            services: default_service_defs(),
            demands: default_demand_defs(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

impl EconomyConfig {
    /// Parse and validate. Omitted sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EconomyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check tunables and cross-references between catalogs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.happiness.weights.sum();
        if (weights - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(invalid(format!("happiness weights sum to {weights}, expected 1")));
        }

        let intervals = [
            ("labor.experience_interval", self.labor.experience_interval),
            ("labor.promotion_interval", self.labor.promotion_interval),
            ("labor.dynamics_interval", self.labor.dynamics_interval),
            ("labor.reevaluation_interval", self.labor.reevaluation_interval),
            ("market.fluctuation_interval", self.market.fluctuation_interval),
            ("market.consumption_interval", self.market.consumption_interval),
        ];
        for (name, value) in intervals {
            if !(value > 0.0) {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !(0.0..=1.0).contains(&self.market.tax_rate) {
            return Err(invalid(format!("tax rate {} outside [0, 1]", self.market.tax_rate)));
        }
        if !(self.market.sell_spread > 0.0 && self.market.sell_spread <= 1.0) {
            return Err(invalid(format!("sell spread {} outside (0, 1]", self.market.sell_spread)));
        }

        let resources: BTreeSet<&str> = self
            .resources
            .resources
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        let known_resource = |id: &str, context: &str| -> Result<(), ConfigError> {
            if resources.contains(id) {
                Ok(())
            } else {
                Err(invalid(format!("{context} references unknown resource {id}")))
            }
        };

        let professions: BTreeMap<&str, SocialClass> =
            self.professions.iter().map(|p| (p.id.as_str(), p.class)).collect();
        let known_profession = |id: &str, context: &str| -> Result<(), ConfigError> {
            if professions.contains_key(id) {
                Ok(())
            } else {
                Err(invalid(format!("{context} references unknown profession {id}")))
            }
        };

        for prof in &self.professions {
            for target in prof.promotes_to.iter().chain(prof.demotes_to.iter()) {
                match professions.get(target.as_str()) {
                    Some(class) if *class == prof.class => {}
                    Some(class) => {
                        return Err(invalid(format!(
                            "profession {} ({:?}) moves to {target} ({class:?}) across classes",
                            prof.id, prof.class
                        )));
                    }
                    None => known_profession(target, &format!("profession {}", prof.id))?,
                }
            }
            for resource in prof.promotion_cost.keys() {
                known_resource(resource, &format!("profession {}", prof.id))?;
            }
        }

        for class in SocialClass::all() {
            let entry = self.labor.entry_professions.get(class);
            match self.professions.iter().find(|p| &p.id == entry) {
                Some(p) if p.class == class => {}
                Some(_) => return Err(invalid(format!("entry profession {entry} is not {class:?} class"))),
                None => known_profession(entry, "labor.entry_professions")?,
            }
        }

        for building in &self.buildings {
            let context = format!("building {}", building.id);
            if let Some(recipe) = &building.recipe {
                if !(recipe.interval > 0.0) {
                    return Err(invalid(format!("{context} has non-positive interval")));
                }
                for resource in recipe.resources() {
                    known_resource(resource, &context)?;
                }
            }
            for resource in building.cost.keys() {
                known_resource(resource, &context)?;
            }
            for profession in building.workers.keys() {
                known_profession(profession, &context)?;
            }
            if building.passive && !building.workers.is_empty() {
                return Err(invalid(format!("{context} is passive but requires workers")));
            }
        }

        for good in &self.goods {
            known_resource(&good.id, "market goods")?;
        }

        for demand in &self.demands {
            for resource in &demand.resources {
                known_resource(resource, &format!("demand {}", demand.id))?;
            }
        }

        Ok(())
    }
}
