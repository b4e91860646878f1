// Building production state machine and upgrades

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::EconomyError;
use crate::labor::Workforce;
use crate::resources::ResourcePool;
use crate::types::{
    BuildingId, BuildingTypeId, Millis, Priority, ResourceBundle, WorkerRequirement,
};

use super::catalog::BuildingDef;
use super::recipe::Recipe;

pub const UPGRADE_EFFICIENCY_STEP: f64 = 0.1;
pub const UPGRADE_OUTPUT_MULTIPLIER: f64 = 1.2;
/// Upgrade cost grows by this fraction of the base cost per level
pub const UPGRADE_COST_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub enum ProductionState {
    Idle,
    Producing,
}

/// A constructed building. Pure state: presentation reads `is_active` and
/// `progress_fraction()` and listens for production events.
#[derive(Debug, Clone)]
pub struct Building {
    pub id: BuildingId,
    pub building_type: BuildingTypeId,
    pub level: u32,
    pub max_level: u32,
    pub recipe: Option<Recipe>,
    pub base_efficiency: f64,
    /// Last multiplier reported by the labor market
    pub worker_efficiency: f64,
    pub progress: Millis,
    pub state: ProductionState,
    pub workers: WorkerRequirement,
    pub priority: Priority,
    pub is_active: bool,
    pub total_produced: ResourceBundle,
    pub cycles: u64,
}

impl Building {
    pub fn new(id: BuildingId, def: &BuildingDef) -> Self {
        Self {
            id,
            building_type: def.id.clone(),
            level: 1,
            max_level: def.max_level,
            recipe: def.recipe.clone(),
            base_efficiency: 1.0,
            worker_efficiency: 0.0,
            progress: 0.0,
            state: ProductionState::Idle,
            workers: def.workers.clone(),
            priority: def.priority,
            is_active: false,
            total_produced: ResourceBundle::new(),
            cycles: 0,
        }
    }

    pub fn interval(&self) -> Millis {
        self.recipe.as_ref().map(|r| r.interval).unwrap_or(0.0)
    }

    /// Completion of the current cycle in [0, 1]
    pub fn progress_fraction(&self) -> f64 {
        let interval = self.interval();
        if interval <= 0.0 {
            return 0.0;
        }
        (self.progress / interval).clamp(0.0, 1.0)
    }

    /// Per-minute output at the current efficiencies
    pub fn per_minute(&self) -> ResourceBundle {
        match &self.recipe {
            Some(recipe) if self.is_active => {
                recipe.per_minute(self.base_efficiency * self.worker_efficiency)
            }
            _ => ResourceBundle::new(),
        }
    }

    /// Advance production by `delta` simulated milliseconds.
    ///
    /// Returns the outputs stored in `pool` when a cycle completes. A building
    /// without sufficient labor is forced idle and keeps its progress. A
    /// completed cycle whose inputs vanished or whose outputs do not fit stays
    /// at full progress and retries next tick.
    pub fn update_production(
        &mut self,
        now: Millis,
        delta: Millis,
        pool: &mut ResourcePool,
        workforce: &impl Workforce,
    ) -> Option<ResourceBundle> {
        if delta <= 0.0 {
            return None;
        }
        let recipe = self.recipe.as_ref()?;

        self.is_active = workforce.has_sufficient_workers(self.id);
        if !self.is_active {
            self.worker_efficiency = 0.0;
            self.state = ProductionState::Idle;
            return None;
        }
        self.worker_efficiency = workforce.efficiency_multiplier(self.id);

        if self.state == ProductionState::Idle {
            if !pool.has_resources(&recipe.inputs) {
                return None;
            }
            self.state = ProductionState::Producing;
        }

        self.progress = (self.progress + delta * self.base_efficiency * self.worker_efficiency)
            .min(recipe.interval);
        if self.progress < recipe.interval {
            return None;
        }

        if let Err(err) = pool.try_produce(recipe) {
            tracing::debug!(
                target: "production",
                building_type = self.building_type.as_str(),
                error = %err,
                "cycle blocked"
            );
            return None;
        }

        let outputs = recipe.outputs.clone();
        self.progress = 0.0;
        self.state = ProductionState::Idle;
        self.record_output(&outputs);

        tracing::debug!(
            target: "production",
            now = now,
            building_type = self.building_type.as_str(),
            level = self.level,
            "cycle complete"
        );

        Some(outputs)
    }

    /// Count one completed cycle toward the running totals
    pub fn record_output(&mut self, outputs: &ResourceBundle) {
        self.cycles += 1;
        for (resource, qty) in outputs {
            *self.total_produced.entry(resource.clone()).or_insert(0.0) += qty;
        }
    }

    /// Cost of the next upgrade: `base_cost * (1 + level * 0.5)`
    pub fn upgrade_cost(&self, base_cost: &ResourceBundle) -> ResourceBundle {
        let factor = 1.0 + self.level as f64 * UPGRADE_COST_STEP;
        base_cost
            .iter()
            .map(|(resource, qty)| (resource.clone(), qty * factor))
            .collect()
    }

    /// Pay for and apply one upgrade level. Returns the new level.
    pub fn upgrade(
        &mut self,
        pool: &mut ResourcePool,
        base_cost: &ResourceBundle,
    ) -> Result<u32, EconomyError> {
        if self.level >= self.max_level {
            return Err(EconomyError::MaxLevelReached(self.max_level));
        }

        let cost = self.upgrade_cost(base_cost);
        let missing = pool.missing(&cost);
        if !missing.is_empty() {
            return Err(EconomyError::InsufficientResources { missing });
        }

        pool.consume_resources(&cost);
        self.level += 1;
        self.base_efficiency += UPGRADE_EFFICIENCY_STEP;
        if let Some(recipe) = &mut self.recipe {
            recipe.scale_outputs(UPGRADE_OUTPUT_MULTIPLIER);
        }
        Ok(self.level)
    }
}
