// Tiered resource ledger with per-resource storage caps

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::error::EconomyError;
use crate::production::Recipe;
use crate::types::{BuildingId, Millis, Quantity, ResourceBundle, ResourceId, Tier};

use super::chain::ProductionChain;

// ============================================================================
// Config
// ============================================================================

/// Default storage cap for each tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCaps {
    pub raw: Quantity,
    pub processed: Quantity,
    pub advanced: Quantity,
    pub end_product: Quantity,
}

impl Default for TierCaps {
    fn default() -> Self {
        Self {
            raw: 1000.0,
            processed: 500.0,
            advanced: 250.0,
            end_product: 100.0,
        }
    }
}

impl TierCaps {
    pub fn cap_for(&self, tier: Tier) -> Quantity {
        match tier {
            Tier::Raw => self.raw,
            Tier::Processed => self.processed,
            Tier::Advanced => self.advanced,
            Tier::EndProduct => self.end_product,
        }
    }
}

/// Catalog entry for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: ResourceId,
    pub tier: Tier,
    #[serde(default)]
    pub initial: Quantity,
    /// Overrides the tier default cap
    #[serde(default)]
    pub cap: Option<Quantity>,
}

impl ResourceDef {
    pub fn new(id: impl Into<ResourceId>, tier: Tier, initial: Quantity) -> Self {
        Self {
            id: id.into(),
            tier,
            initial,
            cap: None,
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub tier: Tier,
    pub value: Quantity,
    pub cap: Quantity,
    /// Running total stored (production, purchases)
    pub inflow_total: Quantity,
    /// Running total removed (recipes, costs, consumption, sales)
    pub outflow_total: Quantity,
}

impl Resource {
    pub fn headroom(&self) -> Quantity {
        (self.cap - self.value).max(0.0)
    }
}

// ============================================================================
// Resource Pool
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    resources: BTreeMap<ResourceId, Resource>,
    chains: SecondaryMap<BuildingId, ProductionChain>,
}

impl ResourcePool {
    pub fn new(defs: &[ResourceDef], caps: &TierCaps) -> Self {
        let resources = defs
            .iter()
            .map(|def| {
                let cap = def.cap.unwrap_or_else(|| caps.cap_for(def.tier));
                let resource = Resource {
                    id: def.id.clone(),
                    tier: def.tier,
                    value: def.initial.clamp(0.0, cap),
                    cap,
                    inflow_total: 0.0,
                    outflow_total: 0.0,
                };
                (def.id.clone(), resource)
            })
            .collect();

        Self {
            resources,
            chains: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Current stock, 0 for unknown resources
    pub fn value(&self, id: &str) -> Quantity {
        self.resources.get(id).map(|r| r.value).unwrap_or(0.0)
    }

    pub fn cap(&self, id: &str) -> Quantity {
        self.resources.get(id).map(|r| r.cap).unwrap_or(0.0)
    }

    pub fn headroom(&self, id: &str) -> Quantity {
        self.resources.get(id).map(Resource::headroom).unwrap_or(0.0)
    }

    /// Stock as a fraction of cap, 0 for unknown or zero-cap resources
    pub fn fill_ratio(&self, id: &str) -> f64 {
        match self.resources.get(id) {
            Some(r) if r.cap > 0.0 => r.value / r.cap,
            _ => 0.0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn has_resources(&self, req: &ResourceBundle) -> bool {
        req.iter().all(|(id, qty)| self.value(id) >= *qty)
    }

    /// Shortfall per resource; empty when `req` is affordable
    pub fn missing(&self, req: &ResourceBundle) -> ResourceBundle {
        req.iter()
            .filter_map(|(id, qty)| {
                let short = qty - self.value(id);
                (short > 0.0).then(|| (id.clone(), short))
            })
            .collect()
    }

    /// True when every amount fits under its cap
    pub fn has_room_for(&self, delta: &ResourceBundle) -> bool {
        delta.iter().all(|(id, qty)| {
            self.resources
                .get(id)
                .is_some_and(|r| r.value + qty <= r.cap)
        })
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Remove every amount in `req`, clamping each resource at zero.
    pub fn consume_resources(&mut self, req: &ResourceBundle) {
        for (id, qty) in req {
            self.take(id, *qty);
        }
    }

    /// Add every amount in `delta`, clamping each resource at its cap.
    pub fn add_resources(&mut self, delta: &ResourceBundle) {
        for (id, qty) in delta {
            self.put(id, *qty);
        }
    }

    /// Remove up to `amount`, returns what was actually removed.
    pub fn take(&mut self, id: &str, amount: Quantity) -> Quantity {
        let Some(resource) = self.resources.get_mut(id) else {
            tracing::warn!(target: "resources", resource = id, "consume of unknown resource ignored");
            return 0.0;
        };
        let taken = amount.max(0.0).min(resource.value);
        resource.value -= taken;
        resource.outflow_total += taken;
        taken
    }

    /// Add up to `amount`, returns what was actually stored.
    pub fn put(&mut self, id: &str, amount: Quantity) -> Quantity {
        let Some(resource) = self.resources.get_mut(id) else {
            tracing::warn!(target: "resources", resource = id, "add of unknown resource ignored");
            return 0.0;
        };
        let stored = amount.max(0.0).min(resource.headroom());
        resource.value += stored;
        resource.inflow_total += stored;
        stored
    }

    /// Raise a resource's cap. Unknown ids are logged and ignored.
    pub fn increase_cap(&mut self, id: &str, amount: Quantity) -> bool {
        match self.resources.get_mut(id) {
            Some(resource) if amount > 0.0 => {
                resource.cap += amount;
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(target: "resources", resource = id, "cap increase for unknown resource ignored");
                false
            }
        }
    }

    /// Run one recipe cycle atomically.
    ///
    /// Inputs must be available and every output must fit under its cap,
    /// otherwise nothing changes. Output caps throttle production instead of
    /// discarding the overflow.
    pub fn try_produce(&mut self, recipe: &Recipe) -> Result<(), EconomyError> {
        let missing = self.missing(&recipe.inputs);
        if !missing.is_empty() {
            return Err(EconomyError::InsufficientResources { missing });
        }
        if let Some((id, qty)) = recipe.outputs.iter().find(|(id, qty)| {
            self.resources
                .get(id.as_str())
                .is_none_or(|r| r.value + **qty > r.cap)
        }) {
            return Err(EconomyError::InsufficientStorage {
                resource: id.clone(),
                requested: *qty,
                available: self.headroom(id),
            });
        }

        self.consume_resources(&recipe.inputs);
        self.add_resources(&recipe.outputs);
        Ok(())
    }

    // ========================================================================
    // Chains
    // ========================================================================

    /// Register a free-running chain for a building. Replaces any previous chain.
    pub fn register_chain(&mut self, building: BuildingId, recipe: Recipe, now: Millis) {
        self.chains
            .insert(building, ProductionChain::new(recipe, now));
    }

    pub fn unregister_chain(&mut self, building: BuildingId) -> Option<ProductionChain> {
        self.chains.remove(building)
    }

    pub fn chain(&self, building: BuildingId) -> Option<&ProductionChain> {
        self.chains.get(building)
    }

    pub fn chain_mut(&mut self, building: BuildingId) -> Option<&mut ProductionChain> {
        self.chains.get_mut(building)
    }

    /// Per-minute output estimate summed over active chains
    pub fn chain_production_rate(&self, id: &str) -> Quantity {
        self.chains
            .values()
            .filter_map(|chain| chain.per_minute().get(id).copied())
            .sum()
    }

    /// Fire every due chain that has inputs and output headroom.
    ///
    /// Chains that cannot run are skipped and keep their timer, so they retry
    /// on the next tick. Returns the outputs produced per building.
    pub fn tick(&mut self, now: Millis, delta: Millis) -> Vec<(BuildingId, ResourceBundle)> {
        let mut produced = Vec::new();
        if delta <= 0.0 {
            return produced;
        }

        let due: Vec<BuildingId> = self
            .chains
            .iter()
            .filter(|(_, chain)| chain.is_due(now))
            .map(|(id, _)| id)
            .collect();

        for id in due {
            let Some(recipe) = self.chains.get(id).map(|c| c.recipe.clone()) else {
                continue;
            };

            match self.try_produce(&recipe) {
                Ok(()) => {
                    if let Some(chain) = self.chains.get_mut(id) {
                        chain.last_production_time = now;
                        chain.runs += 1;
                    }

                    #[cfg(feature = "instrument")]
                    {
                        for (resource, qty) in &recipe.outputs {
                            tracing::info!(
                                target: "production",
                                now = now,
                                source = "chain",
                                resource = resource.as_str(),
                                quantity = *qty,
                            );
                        }
                    }

                    produced.push((id, recipe.outputs));
                }
                Err(err) => {
                    tracing::debug!(target: "production", error = %err, "chain skipped");
                }
            }
        }

        produced
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn bundle(items: &[(&str, Quantity)]) -> ResourceBundle {
        items.iter().map(|(id, q)| (id.to_string(), *q)).collect()
    }

    fn make_pool() -> ResourcePool {
        ResourcePool::new(
            &[
                ResourceDef::new("ore", Tier::Raw, 10.0),
                ResourceDef::new("essence", Tier::Advanced, 0.0),
                ResourceDef {
                    cap: Some(5.0),
                    ..ResourceDef::new("water", Tier::Raw, 0.0)
                },
            ],
            &TierCaps::default(),
        )
    }

    fn make_ids(n: usize) -> Vec<BuildingId> {
        let mut keys: SlotMap<BuildingId, ()> = SlotMap::with_key();
        (0..n).map(|_| keys.insert(())).collect()
    }

    #[test]
    fn test_caps_follow_tier_defaults() {
        let pool = make_pool();
        assert_eq!(pool.cap("ore"), 1000.0);
        assert_eq!(pool.cap("essence"), 250.0);
        assert_eq!(pool.cap("water"), 5.0);
    }

    #[test]
    fn test_consume_clamps_at_zero() {
        let mut pool = make_pool();
        pool.consume_resources(&bundle(&[("ore", 100.0)]));
        assert_eq!(pool.value("ore"), 0.0);
        assert_eq!(pool.get("ore").unwrap().outflow_total, 10.0);
    }

    #[test]
    fn test_add_clamps_at_cap() {
        let mut pool = make_pool();
        pool.add_resources(&bundle(&[("water", 7.0)]));
        assert_eq!(pool.value("water"), 5.0);

        assert!(pool.increase_cap("water", 10.0));
        pool.add_resources(&bundle(&[("water", 7.0)]));
        assert_eq!(pool.value("water"), 12.0);
    }

    #[test]
    fn test_unknown_resources_are_noops() {
        let mut pool = make_pool();
        assert_eq!(pool.put("gold", 5.0), 0.0);
        assert_eq!(pool.take("gold", 5.0), 0.0);
        assert!(!pool.increase_cap("gold", 5.0));
        assert!(!pool.has_resources(&bundle(&[("gold", 1.0)])));
    }

    #[test]
    fn test_missing_reports_shortfall() {
        let pool = make_pool();
        let missing = pool.missing(&bundle(&[("ore", 15.0), ("essence", 0.0)]));
        assert_eq!(missing, bundle(&[("ore", 5.0)]));
    }

    #[test]
    fn test_try_produce_requires_output_headroom() {
        let mut pool = make_pool();
        pool.put("water", 5.0);
        let recipe = Recipe::new(1000.0)
            .with_input("ore", 1.0)
            .with_output("water", 1.0);

        let err = pool.try_produce(&recipe).unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientStorage { .. }));
        // Nothing committed
        assert_eq!(pool.value("ore"), 10.0);
        assert_eq!(pool.value("water"), 5.0);
    }

    #[test]
    fn test_chain_tick_produces_and_resets_timer() {
        let mut pool = make_pool();
        let ids = make_ids(1);
        let recipe = Recipe::new(3000.0)
            .with_input("ore", 2.0)
            .with_output("essence", 1.0);
        pool.register_chain(ids[0], recipe, 0.0);

        assert!(pool.tick(3000.0, 3000.0).is_empty());
        let produced = pool.tick(3001.0, 1.0);
        assert_eq!(produced.len(), 1);
        assert_eq!(pool.value("ore"), 8.0);
        assert_eq!(pool.value("essence"), 1.0);
        assert_eq!(pool.chain(ids[0]).unwrap().last_production_time, 3001.0);
        assert_eq!(pool.chain_production_rate("essence"), 20.0);

        // Timer reset: not due again until another full interval elapses
        assert!(pool.tick(4000.0, 999.0).is_empty());
    }

    #[test]
    fn test_capped_chain_is_throttled() {
        let mut pool = make_pool();
        let ids = make_ids(1);
        pool.register_chain(ids[0], Recipe::new(100.0).with_output("water", 2.0), 0.0);

        let mut now = 0.0;
        for _ in 0..10 {
            now += 101.0;
            pool.tick(now, 101.0);
        }
        // 2 + 2 fit, the third cycle would overflow the cap of 5
        assert_eq!(pool.value("water"), 4.0);
        assert_eq!(pool.chain(ids[0]).unwrap().runs, 2);
    }

    #[test]
    fn test_zero_delta_tick_is_noop() {
        let mut pool = make_pool();
        let ids = make_ids(1);
        pool.register_chain(ids[0], Recipe::new(10.0).with_output("essence", 1.0), 0.0);
        for _ in 0..5 {
            assert!(pool.tick(500.0, 0.0).is_empty());
        }
        assert_eq!(pool.value("essence"), 0.0);
    }
}
