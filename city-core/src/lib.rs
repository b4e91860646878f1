use wasm_bindgen::prelude::*;

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod labor;
pub mod market;
pub mod production;
pub mod resources;
pub mod snapshot;
pub mod types;
pub mod world;

pub use config::EconomyConfig;
pub use error::{ConfigError, EconomyError};
pub use events::{PopulationChangeReason, SimEvent};
pub use labor::{LaborMarket, Workforce};
pub use market::{LocalEvent, TaxEvent, TradeMarket, TradeOutcome};
pub use production::{Building, BuildingDef, ProductionState, Recipe};
pub use resources::ResourcePool;
pub use snapshot::EconomySnapshot;
pub use types::*;
pub use world::World;

// ============================================================================
// WASM API - Simulation
// ============================================================================

#[wasm_bindgen]
pub struct Simulation {
    world: World,
}

fn random_seed() -> u64 {
    (js_sys::Math::random() * u64::MAX as f64) as u64
}

#[wasm_bindgen]
impl Simulation {
    /// Default city. Without a seed one is drawn from `Math.random`.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u64>) -> Self {
        console_error_panic_hook::set_once();
        let seed = seed.unwrap_or_else(random_seed);
        Self {
            world: World::with_seed(EconomyConfig::default(), seed),
        }
    }

    /// City from a JSON economy config. Omitted sections take defaults.
    #[wasm_bindgen]
    pub fn from_config_json(json: &str, seed: Option<u64>) -> Result<Simulation, JsError> {
        console_error_panic_hook::set_once();
        let config = EconomyConfig::from_json(json)?;
        let seed = seed.unwrap_or_else(random_seed);
        Ok(Self {
            world: World::with_seed(config, seed),
        })
    }

    /// Advance by real elapsed milliseconds; returns simulated milliseconds
    #[wasm_bindgen]
    pub fn advance(&mut self, real_delta_ms: f64) -> f64 {
        self.world.tick(real_delta_ms)
    }

    #[wasm_bindgen]
    pub fn set_time_scale(&mut self, scale: f64) {
        self.world.set_time_scale(scale);
    }

    #[wasm_bindgen]
    pub fn set_paused(&mut self, paused: bool) {
        self.world.set_paused(paused);
    }

    /// Report the calendar month; returns a tax event when the month changed
    #[wasm_bindgen]
    pub fn observe_month(&mut self, month: u32) -> Result<JsValue, JsValue> {
        let event = self.world.observe_month(month);
        Ok(serde_wasm_bindgen::to_value(&event)?)
    }

    #[wasm_bindgen]
    pub fn construct(&mut self, building_type: &str) -> Result<u64, JsError> {
        let id = self.world.construct(building_type)?;
        Ok(id.to_u64())
    }

    #[wasm_bindgen]
    pub fn remove(&mut self, building: u64) -> Result<(), JsError> {
        self.world.remove(building_id_from_u64(building))?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn upgrade(&mut self, building: u64) -> Result<u32, JsError> {
        Ok(self.world.upgrade(building_id_from_u64(building))?)
    }

    /// Buy with the caller's `gold`; deduct `cost` from it on success
    #[wasm_bindgen]
    pub fn buy(&mut self, resource: &str, amount: f64, gold: f64) -> TradeOutcome {
        self.world.buy(resource, amount, gold)
    }

    #[wasm_bindgen]
    pub fn sell(&mut self, resource: &str, amount: f64) -> TradeOutcome {
        self.world.sell(resource, amount)
    }

    /// `event` is `{ id, start_time, duration, price_modifiers }`
    #[wasm_bindgen]
    pub fn add_local_event(&mut self, event: JsValue) -> Result<(), JsError> {
        let event: LocalEvent =
            serde_wasm_bindgen::from_value(event).map_err(|e| JsError::new(&e.to_string()))?;
        self.world.add_local_event(event)?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn now(&self) -> f64 {
        self.world.now()
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> EconomySnapshot {
        self.world.snapshot()
    }

    /// Events since the last drain, oldest first
    #[wasm_bindgen]
    pub fn drain_events(&mut self) -> Result<JsValue, JsValue> {
        let events = self.world.drain_events();
        Ok(serde_wasm_bindgen::to_value(&events)?)
    }
}
