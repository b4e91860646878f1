// Serializable read-only view of the world for the presentation layer

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::production::ProductionState;
use crate::types::{KeyToU64, Quantity, ResourceBundle, SocialClass, Tier};
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ResourceAmount {
    pub resource: String,
    pub amount: f64,
}

fn amounts(bundle: &ResourceBundle) -> Vec<ResourceAmount> {
    bundle
        .iter()
        .map(|(resource, amount)| ResourceAmount {
            resource: resource.clone(),
            amount: *amount,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ResourceSnapshot {
    pub id: String,
    pub tier: Tier,
    pub value: Quantity,
    pub cap: Quantity,
    /// Per-minute output of free-running chains
    pub chain_rate: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct BuildingSnapshot {
    pub id: u64,
    pub building_type: String,
    pub level: u32,
    pub state: ProductionState,
    pub is_active: bool,
    pub progress: f64,
    pub efficiency: f64,
    pub workers: Vec<WorkerCount>,
    pub per_minute: Vec<ResourceAmount>,
    pub total_produced: Vec<ResourceAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct WorkerCount {
    pub profession: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ProfessionSnapshot {
    pub id: String,
    pub class: SocialClass,
    pub count: u32,
    pub assigned: u32,
    pub experience: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ClassSnapshot {
    pub class: SocialClass,
    pub population: u32,
    pub housing_capacity: u32,
    pub happiness: f64,
    pub housing_factor: f64,
    pub market_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PriceSnapshot {
    pub id: String,
    pub price: f64,
    pub base_price: f64,
    /// `None` for services, which hold no stock
    pub inventory: Option<f64>,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct EconomySnapshot {
    pub tick: u64,
    pub now: f64,
    pub time_scale: f64,
    pub paused: bool,
    pub resources: Vec<ResourceSnapshot>,
    pub buildings: Vec<BuildingSnapshot>,
    pub professions: Vec<ProfessionSnapshot>,
    pub classes: Vec<ClassSnapshot>,
    pub overall_happiness: f64,
    pub goods: Vec<PriceSnapshot>,
    pub services: Vec<PriceSnapshot>,
    pub inflation: f64,
    pub revenue: f64,
    pub active_events: Vec<String>,
}

pub fn capture(world: &World) -> EconomySnapshot {
    let pool = world.pool();
    let labor = world.labor();
    let market = world.market();
    let now = world.now();

    let resources = pool
        .iter()
        .map(|r| ResourceSnapshot {
            id: r.id.clone(),
            tier: r.tier,
            value: r.value,
            cap: r.cap,
            chain_rate: pool.chain_production_rate(&r.id),
        })
        .collect();

    let buildings = world
        .buildings()
        .map(|(id, b)| {
            let workers = labor
                .allocation(id)
                .map(|alloc| {
                    alloc
                        .iter()
                        .map(|(profession, count)| WorkerCount {
                            profession: profession.clone(),
                            count: *count,
                        })
                        .collect()
                })
                .unwrap_or_default();
            let per_minute = match pool.chain(id) {
                Some(chain) => chain.per_minute(),
                None => b.per_minute(),
            };
            BuildingSnapshot {
                id: id.to_u64(),
                building_type: b.building_type.clone(),
                level: b.level,
                state: b.state,
                is_active: b.is_active,
                progress: b.progress_fraction(),
                efficiency: b.base_efficiency * b.worker_efficiency,
                workers,
                per_minute: amounts(&per_minute),
                total_produced: amounts(&b.total_produced),
            }
        })
        .collect();

    let professions = labor
        .professions()
        .map(|p| ProfessionSnapshot {
            id: p.id().clone(),
            class: p.class(),
            count: p.count,
            assigned: p.assigned,
            experience: p.experience,
        })
        .collect();

    let classes = SocialClass::all()
        .map(|class| {
            let state = labor.class_state(class);
            ClassSnapshot {
                class,
                population: labor.class_population(class),
                housing_capacity: state.housing_capacity,
                happiness: state.happiness,
                housing_factor: state.factors.housing,
                market_factor: state.factors.market,
            }
        })
        .collect();

    let goods = market
        .goods()
        .map(|g| PriceSnapshot {
            id: g.id.clone(),
            price: g.current_price,
            base_price: g.base_price,
            inventory: Some(g.inventory),
            history: g.history.to_vec(),
        })
        .collect();

    let services = market
        .services()
        .map(|s| PriceSnapshot {
            id: s.id.clone(),
            price: s.current_price,
            base_price: s.base_price,
            inventory: None,
            history: s.history.to_vec(),
        })
        .collect();

    EconomySnapshot {
        tick: world.tick_count(),
        now,
        time_scale: world.clock().time_scale,
        paused: world.clock().paused,
        resources,
        buildings,
        professions,
        classes,
        overall_happiness: labor.overall_happiness(),
        goods,
        services,
        inflation: market.inflation_rate(),
        revenue: market.revenue(),
        active_events: market.active_events(now).map(|e| e.id.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EconomyConfig;
    use crate::world::World;

    #[test]
    fn test_snapshot_reflects_world() {
        let mut world = World::with_seed(EconomyConfig::default(), 7);
        world.construct("farm").unwrap();
        world.construct("well").unwrap();
        world.tick(1_000.0);

        let snap = world.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.buildings.len(), 2);
        assert_eq!(snap.classes.len(), 3);
        let farm = snap.buildings.iter().find(|b| b.building_type == "farm").unwrap();
        assert_eq!(farm.workers.len(), 1);
        assert!(farm.progress > 0.0 && farm.progress < 1.0);

        let water = snap.resources.iter().find(|r| r.id == "water").unwrap();
        assert_eq!(water.chain_rate, 75.0);
        assert!(snap.services.iter().all(|s| s.inventory.is_none()));
    }

    #[test]
    fn test_snapshot_serializes_ids_as_numbers() {
        let mut world = World::with_seed(EconomyConfig::default(), 7);
        world.construct("farm").unwrap();
        let json = serde_json::to_value(world.snapshot()).unwrap();
        assert!(json["buildings"][0]["id"].is_u64());
    }
}
