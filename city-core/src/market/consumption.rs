// Population consumption of goods and the happiness it produces

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labor::DemandSatisfaction;
use crate::resources::ResourcePool;
use crate::types::{ClassTable, DemandId, Price, ResourceBundle, ResourceId, SocialClass};

pub const SATISFACTION_WEIGHT: f64 = 0.7;
pub const PRICE_WEIGHT: f64 = 0.3;
/// Largest happiness swing of a demand with importance 1
pub const MAX_DEMAND_IMPACT: f64 = 20.0;

/// A consumption need shared across a set of substitutable resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandDef {
    pub id: DemandId,
    pub resources: Vec<ResourceId>,
    /// Units per person per consumption interval
    pub rate: ClassTable<f64>,
    pub importance: ClassTable<f64>,
}

impl DemandDef {
    pub fn new(
        id: impl Into<DemandId>,
        resources: &[&str],
        rate: ClassTable<f64>,
        importance: ClassTable<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            rate,
            importance,
        }
    }
}

pub fn default_demand_defs() -> Vec<DemandDef> {
    vec![
        DemandDef::new(
            "food",
            &["food", "bread"],
            ClassTable::new(0.1, 0.12, 0.15),
            ClassTable::new(0.5, 0.35, 0.25),
        ),
        DemandDef::new(
            "water",
            &["water"],
            ClassTable::splat(0.1),
            ClassTable::new(0.3, 0.25, 0.2),
        ),
        DemandDef::new(
            "goods",
            &["tools", "planks"],
            ClassTable::new(0.01, 0.03, 0.05),
            ClassTable::new(0.2, 0.25, 0.25),
        ),
        DemandDef::new(
            "luxury",
            &["jewelry"],
            ClassTable::new(0.0, 0.005, 0.02),
            ClassTable::new(0.0, 0.15, 0.3),
        ),
    ]
}

/// `((0.7 * satisfaction + 0.3 * price_score) * 2 - 1) * 20 * importance`
pub fn demand_impact(satisfaction: f64, price_score: f64, importance: f64) -> f64 {
    ((SATISFACTION_WEIGHT * satisfaction + PRICE_WEIGHT * price_score) * 2.0 - 1.0)
        * MAX_DEMAND_IMPACT
        * importance
}

/// Results of one consumption round
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsumptionReport {
    /// Summed demand impacts per class, the market happiness input
    pub impacts: ClassTable<f64>,
    pub satisfaction: ClassTable<BTreeMap<DemandId, DemandSatisfaction>>,
    /// Money spent at current prices
    pub spending: f64,
    pub consumed: ResourceBundle,
}

/// Current and base price of a consumable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub current: Price,
    pub base: Price,
}

/// Consume every demand for every class from the player's stock.
///
/// Demand is spread evenly over a demand's resources and each resource gives
/// what it has. Resources without a quote are consumed for free.
pub fn consume(
    demands: &[DemandDef],
    populations: &ClassTable<u32>,
    pool: &mut ResourcePool,
    quote: impl Fn(&str) -> Option<PriceQuote>,
) -> ConsumptionReport {
    let mut report = ConsumptionReport::default();

    for class in SocialClass::all() {
        let population = *populations.get(class) as f64;
        if population <= 0.0 {
            continue;
        }

        for demand in demands {
            let demanded = demand.rate.get(class) * population;
            if demanded <= 0.0 || demand.resources.is_empty() {
                continue;
            }
            let share = demanded / demand.resources.len() as f64;

            let mut consumed = 0.0;
            let mut cost = 0.0;
            let mut base_cost = 0.0;
            for resource in &demand.resources {
                let taken = pool.take(resource, share);
                if taken <= 0.0 {
                    continue;
                }
                consumed += taken;
                *report.consumed.entry(resource.clone()).or_insert(0.0) += taken;
                if let Some(q) = quote(resource) {
                    cost += taken * q.current;
                    base_cost += taken * q.base;
                }
            }

            let satisfaction = (consumed / demanded).clamp(0.0, 1.0);
            let price_score = if consumed <= 0.0 {
                0.0
            } else if cost <= 0.0 {
                1.0
            } else {
                (base_cost / cost).min(1.0)
            };
            let impact = demand_impact(satisfaction, price_score, *demand.importance.get(class));

            *report.impacts.get_mut(class) += impact;
            report.spending += cost;
            report.satisfaction.get_mut(class).insert(
                demand.id.clone(),
                DemandSatisfaction {
                    satisfaction,
                    price_score,
                    impact,
                },
            );
        }
    }

    report
}
