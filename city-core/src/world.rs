// World: owns every subsystem and advances them in a fixed order

use rand::SeedableRng;
use rand::rngs::StdRng;
use slotmap::SlotMap;

use crate::clock::SimClock;
use crate::config::EconomyConfig;
use crate::error::EconomyError;
use crate::events::{EventQueue, SimEvent};
use crate::labor::LaborMarket;
use crate::market::{LocalEvent, TaxEvent, TradeMarket, TradeOutcome};
use crate::production::{Building, BuildingCatalog};
use crate::resources::ResourcePool;
use crate::snapshot::{self, EconomySnapshot};
use crate::types::{BuildingId, Millis, Quantity};

pub const DEFAULT_SEED: u64 = 0x5EED_C17E;

pub struct World {
    config: EconomyConfig,
    clock: SimClock,
    pool: ResourcePool,
    catalog: BuildingCatalog,
    buildings: SlotMap<BuildingId, Building>,
    labor: LaborMarket,
    market: TradeMarket,
    events: EventQueue,
    rng: StdRng,
    tick: u64,
}

impl World {
    /// Build a world with the default seed. Hosts wanting varied games pass
    /// their own seed to `with_seed`.
    pub fn new(config: EconomyConfig) -> Self {
        Self::with_seed(config, DEFAULT_SEED)
    }

    pub fn with_seed(config: EconomyConfig, seed: u64) -> Self {
        let rng = StdRng::seed_from_u64(seed);
        let pool = ResourcePool::new(&config.resources.resources, &config.resources.caps);
        let catalog = BuildingCatalog::new(config.buildings.iter().cloned());
        let labor = LaborMarket::new(
            config.professions.clone(),
            config.labor.clone(),
            config.happiness.clone(),
        );
        let market = TradeMarket::new(
            &config.goods,
            &config.services,
            config.demands.clone(),
            config.market.clone(),
        );

        Self {
            config,
            clock: SimClock::new(),
            pool,
            catalog,
            buildings: SlotMap::with_key(),
            labor,
            market,
            events: EventQueue::default(),
            rng,
            tick: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn now(&self) -> Millis {
        self.clock.now
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, &Building)> {
        self.buildings.iter()
    }

    pub fn labor(&self) -> &LaborMarket {
        &self.labor
    }

    pub fn labor_mut(&mut self) -> &mut LaborMarket {
        &mut self.labor
    }

    pub fn market(&self) -> &TradeMarket {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut TradeMarket {
        &mut self.market
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        snapshot::capture(self)
    }

    // ========================================================================
    // Time
    // ========================================================================

    pub fn set_time_scale(&mut self, scale: f64) {
        self.clock.set_time_scale(scale);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Pay for and place a building of `building_type`.
    ///
    /// A staffed building that cannot get its full crew right away still
    /// gets built; it waits for the next labor re-evaluation.
    pub fn construct(&mut self, building_type: &str) -> Result<BuildingId, EconomyError> {
        let def = self
            .catalog
            .get(building_type)
            .cloned()
            .ok_or_else(|| EconomyError::UnknownBuildingType(building_type.to_string()))?;

        let missing = self.pool.missing(&def.cost);
        if !missing.is_empty() {
            return Err(EconomyError::InsufficientResources { missing });
        }
        self.pool.consume_resources(&def.cost);

        let id = self.buildings.insert_with_key(|id| {
            let mut building = Building::new(id, &def);
            // Chains need no crew
            building.is_active = def.passive;
            building
        });
        if def.passive {
            if let Some(recipe) = &def.recipe {
                self.pool.register_chain(id, recipe.clone(), self.clock.now);
            }
        } else if !def.workers.is_empty() {
            if let Err(err) = self
                .labor
                .assign(id, def.id.clone(), def.workers.clone(), def.priority)
            {
                tracing::debug!(
                    target: "world",
                    building_type,
                    error = %err,
                    "built without a full crew"
                );
            }
        }
        if let Some(housing) = def.housing {
            self.labor.add_housing(housing.class, housing.capacity);
        }

        tracing::info!(target: "world", now = self.clock.now, building_type, "constructed");
        self.events.push(SimEvent::BuildingConstructed {
            building: id,
            building_type: def.id,
        });
        Ok(id)
    }

    /// Tear a building down. Its workers return to their pools; nothing is refunded.
    pub fn remove(&mut self, id: BuildingId) -> Result<(), EconomyError> {
        let building = self
            .buildings
            .remove(id)
            .ok_or(EconomyError::UnknownBuilding)?;
        self.labor.unregister(id);
        self.pool.unregister_chain(id);
        match self.catalog.get(&building.building_type) {
            Some(def) => {
                if let Some(housing) = def.housing {
                    self.labor.remove_housing(housing.class, housing.capacity);
                }
            }
            None => {
                tracing::warn!(
                    target: "world",
                    building_type = building.building_type.as_str(),
                    "removed building has no catalog entry"
                );
            }
        }

        self.events.push(SimEvent::BuildingRemoved {
            building: id,
            building_type: building.building_type,
        });
        Ok(())
    }

    /// Upgrade one level, paying the scaled construction cost.
    pub fn upgrade(&mut self, id: BuildingId) -> Result<u32, EconomyError> {
        let building = self
            .buildings
            .get_mut(id)
            .ok_or(EconomyError::UnknownBuilding)?;
        let def = self
            .catalog
            .get(&building.building_type)
            .ok_or_else(|| EconomyError::UnknownBuildingType(building.building_type.clone()))?;

        let level = building.upgrade(&mut self.pool, &def.cost)?;
        if let (Some(chain), Some(recipe)) = (self.pool.chain_mut(id), &building.recipe) {
            chain.recipe = recipe.clone();
            chain.efficiency = building.base_efficiency;
        }

        self.events.push(SimEvent::BuildingUpgraded { building: id, level });
        Ok(level)
    }

    // ========================================================================
    // Trade & Tax
    // ========================================================================

    /// Buy for the player. `gold` is the caller's balance; deduct `cost` on success.
    pub fn buy(&mut self, resource: &str, amount: Quantity, gold: f64) -> TradeOutcome {
        self.market
            .player_buy_resource(resource, amount, &mut self.pool, gold)
    }

    pub fn sell(&mut self, resource: &str, amount: Quantity) -> TradeOutcome {
        self.market
            .player_sell_resource(resource, amount, &mut self.pool)
    }

    pub fn add_local_event(&mut self, event: LocalEvent) -> Result<(), EconomyError> {
        let id = event.id.clone();
        self.market.add_local_event(event)?;
        self.events.push(SimEvent::LocalEventStarted { id });
        Ok(())
    }

    /// Tell the world the current game month; collects tax on a month change.
    pub fn observe_month(&mut self, month: u32) -> Option<TaxEvent> {
        let event = self.market.observe_month(month)?;
        self.events.push(SimEvent::TaxCollected {
            tax_amount: event.tax_amount,
            revenue: event.revenue,
        });
        Some(event)
    }

    pub fn process_monthly_tax(&mut self) -> TaxEvent {
        let event = self.market.process_monthly_tax();
        self.events.push(SimEvent::TaxCollected {
            tax_amount: event.tax_amount,
            revenue: event.revenue,
        });
        event
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance by `real_delta` real milliseconds. Returns the simulated delta.
    ///
    /// Order: pool chains, staffed buildings, labor, market. A zero simulated
    /// delta (paused, zero scale or zero input) leaves every subsystem untouched.
    pub fn tick(&mut self, real_delta: Millis) -> Millis {
        let delta = self.clock.advance(real_delta);
        if delta <= 0.0 {
            return 0.0;
        }
        let now = self.clock.now;
        self.tick += 1;

        // 1. Free-running chains
        for (id, outputs) in self.pool.tick(now, delta) {
            if let Some(building) = self.buildings.get_mut(id) {
                building.record_output(&outputs);
            }
            self.events.push(SimEvent::ProductionCompleted {
                building: id,
                outputs,
            });
        }

        // 2. Staffed buildings
        for (id, building) in self.buildings.iter_mut() {
            if self.pool.chain(id).is_some() {
                continue;
            }
            let before = (building.state, building.is_active);
            let produced = building.update_production(now, delta, &mut self.pool, &self.labor);
            if (building.state, building.is_active) != before {
                self.events.push(SimEvent::ProductionStateChanged {
                    building: id,
                    state: building.state,
                    active: building.is_active,
                });
            }
            if let Some(outputs) = produced {
                #[cfg(feature = "instrument")]
                {
                    for (resource, qty) in &outputs {
                        tracing::info!(
                            target: "production",
                            now = now,
                            source = "building",
                            building_type = building.building_type.as_str(),
                            resource = resource.as_str(),
                            quantity = *qty,
                        );
                    }
                }
                self.events.push(SimEvent::ProductionCompleted {
                    building: id,
                    outputs,
                });
            }
        }

        // 3. Labor
        let labor_events = self.labor.tick(now, delta, &mut self.pool, &mut self.rng);
        self.events.extend(labor_events);

        // 4. Market
        let populations = self.labor.populations();
        let market = self
            .market
            .tick(now, delta, &mut self.pool, &populations, &mut self.rng);
        for report in market.consumption {
            self.labor
                .apply_market_results(&report.impacts, report.satisfaction);
        }
        self.events.extend(
            market
                .expired_events
                .into_iter()
                .map(|id| SimEvent::LocalEventExpired { id }),
        );

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::ProductionState;
    use crate::types::SocialClass;

    fn make_world() -> World {
        World::with_seed(EconomyConfig::default(), 42)
    }

    #[test]
    fn test_construct_consumes_cost_and_staffs() {
        let mut world = make_world();
        let wood = world.pool().value("wood");
        let id = world.construct("farm").unwrap();

        assert_eq!(world.pool().value("wood"), wood - 20.0);
        assert_eq!(world.labor().profession("farmer").unwrap().assigned, 4);
        assert!(matches!(
            world.drain_events().as_slice(),
            [SimEvent::BuildingConstructed { building, .. }] if *building == id
        ));
    }

    #[test]
    fn test_construct_failures() {
        let mut world = make_world();
        assert_eq!(
            world.construct("castle").unwrap_err(),
            EconomyError::UnknownBuildingType("castle".into())
        );
        // Workshop needs 20 planks, the city starts with none
        let err = world.construct("workshop").unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientResources { ref missing } if missing.contains_key("planks")));
        assert_eq!(world.buildings().count(), 0);
    }

    #[test]
    fn test_remove_releases_workers_and_housing() {
        let mut world = make_world();
        let farm = world.construct("farm").unwrap();
        let cottage = world.construct("cottage").unwrap();
        let capacity = world.labor().class_state(SocialClass::Lower).housing_capacity;

        world.remove(farm).unwrap();
        world.remove(cottage).unwrap();
        assert_eq!(world.labor().profession("farmer").unwrap().assigned, 0);
        assert_eq!(
            world.labor().class_state(SocialClass::Lower).housing_capacity,
            capacity - 20
        );
        assert_eq!(world.remove(farm).unwrap_err(), EconomyError::UnknownBuilding);
    }

    #[test]
    fn test_farm_produces_food() {
        let mut world = make_world();
        let id = world.construct("farm").unwrap();
        let food = world.pool().value("food");

        // Farm cycle is 6s at efficiency 1; consumption first fires at 10s
        world.tick(6_000.0);
        assert_eq!(world.pool().value("food"), food + 8.0);
        assert_eq!(world.building(id).unwrap().cycles, 1);
        assert_eq!(world.building(id).unwrap().state, ProductionState::Idle);
    }

    #[test]
    fn test_passive_well_runs_as_chain() {
        let mut world = make_world();
        let id = world.construct("well").unwrap();
        world.pool_mut().take("water", 100.0);
        let water = world.pool().value("water");

        world.tick(4_001.0);
        assert_eq!(world.pool().value("water"), water + 5.0);
        assert_eq!(world.building(id).unwrap().cycles, 1);
        assert!(world.pool().chain(id).is_some());
    }

    #[test]
    fn test_upgrade_updates_chain() {
        let mut world = make_world();
        let id = world.construct("well").unwrap();
        assert_eq!(world.upgrade(id), Ok(2));
        let chain = world.pool().chain(id).unwrap();
        assert!((chain.efficiency - 1.1).abs() < 1e-9);
        assert!((chain.recipe.outputs["water"] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_paused_world_stands_still() {
        let mut world = make_world();
        world.construct("farm").unwrap();
        world.drain_events();
        world.set_paused(true);
        assert_eq!(world.tick(60_000.0), 0.0);
        assert_eq!(world.tick_count(), 0);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn test_month_change_collects_tax() {
        let mut world = make_world();
        assert!(world.observe_month(1).is_none());
        world.tick(10_000.0);
        assert!(world.market().revenue() > 0.0);

        let event = world.observe_month(2).unwrap();
        assert_eq!(event.tax_amount, (event.revenue * 0.1).floor());
        assert_eq!(world.market().revenue(), 0.0);
    }
}
