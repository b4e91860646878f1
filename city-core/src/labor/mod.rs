// Labor market: population by class and profession, building staffing,
// experience, promotion and class dynamics

pub mod allocation;
pub mod dynamics;
pub mod happiness;
pub mod profession;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::clock::Cadence;
use crate::error::EconomyError;
use crate::events::{PopulationChangeReason, SimEvent};
use crate::resources::ResourcePool;
use crate::types::{
    BuildingId, BuildingTypeId, ClassTable, DemandId, Millis, Priority, ProfessionId,
    ResourceBundle, SocialClass, WorkerRequirement,
};

pub use allocation::Professions;
pub use dynamics::ClassShift;
pub use happiness::{ClassState, DemandSatisfaction, HappinessConfig, HappinessWeights};
pub use profession::{Profession, ProfessionDef, default_profession_defs};

use allocation::{
    allocation_ratios, class_availability, class_requirements, plan_assignment,
    scale_requirement, total_workers,
};

/// Staffing queries a building needs before it may produce.
pub trait Workforce {
    fn has_sufficient_workers(&self, building: BuildingId) -> bool;
    fn efficiency_multiplier(&self, building: BuildingId) -> f64;
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaborConfig {
    pub experience_interval: Millis,
    pub promotion_interval: Millis,
    pub dynamics_interval: Millis,
    pub reevaluation_interval: Millis,
    /// Experience gained per assigned worker per experience interval
    pub experience_rate: f64,
    pub loss_threshold: f64,
    pub max_loss_fraction: f64,
    pub demotion_threshold: f64,
    pub max_demotion_fraction: f64,
    pub upward_threshold_lower: f64,
    pub upward_threshold_middle: f64,
    pub max_mobility_fraction: f64,
    pub immigration_threshold: f64,
    /// Fraction of the total population
    pub max_immigration_fraction: f64,
    /// Profession that receives people entering each class
    pub entry_professions: ClassTable<ProfessionId>,
    /// Housing available before any housing building exists
    pub base_housing: ClassTable<u32>,
}

impl Default for LaborConfig {
    fn default() -> Self {
        Self {
            experience_interval: 1_000.0,
            promotion_interval: 5_000.0,
            dynamics_interval: 10_000.0,
            reevaluation_interval: 2_000.0,
            experience_rate: 1.0,
            loss_threshold: 20.0,
            max_loss_fraction: 0.08,
            demotion_threshold: 35.0,
            max_demotion_fraction: 0.05,
            upward_threshold_lower: 75.0,
            upward_threshold_middle: 85.0,
            max_mobility_fraction: 0.03,
            immigration_threshold: 70.0,
            max_immigration_fraction: 0.02,
            entry_professions: ClassTable::new(
                "laborer".to_string(),
                "clerk".to_string(),
                "scholar".to_string(),
            ),
            base_housing: ClassTable::new(100, 30, 10),
        }
    }
}

/// What a building asked for when it registered
#[derive(Debug, Clone, PartialEq)]
pub struct LaborDemand {
    pub building_type: BuildingTypeId,
    pub requirement: WorkerRequirement,
    pub priority: Priority,
}

// ============================================================================
// Labor Market
// ============================================================================

#[derive(Debug, Clone)]
pub struct LaborMarket {
    config: LaborConfig,
    happiness_config: HappinessConfig,
    professions: Professions,
    classes: ClassTable<ClassState>,
    overall_happiness: f64,
    demands: SecondaryMap<BuildingId, LaborDemand>,
    allocations: SecondaryMap<BuildingId, WorkerRequirement>,
    experience_timer: Cadence,
    promotion_timer: Cadence,
    dynamics_timer: Cadence,
    reevaluation_timer: Cadence,
}

impl LaborMarket {
    pub fn new(defs: Vec<ProfessionDef>, config: LaborConfig, happiness_config: HappinessConfig) -> Self {
        let professions = defs
            .into_iter()
            .map(|def| (def.id.clone(), Profession::new(def)))
            .collect();
        let classes = ClassTable::new(
            ClassState::new(&happiness_config, config.base_housing.lower),
            ClassState::new(&happiness_config, config.base_housing.middle),
            ClassState::new(&happiness_config, config.base_housing.upper),
        );

        let mut market = Self {
            experience_timer: Cadence::new(config.experience_interval),
            promotion_timer: Cadence::new(config.promotion_interval),
            dynamics_timer: Cadence::new(config.dynamics_interval),
            reevaluation_timer: Cadence::new(config.reevaluation_interval),
            config,
            happiness_config,
            professions,
            classes,
            overall_happiness: 0.0,
            demands: SecondaryMap::new(),
            allocations: SecondaryMap::new(),
        };
        market.refresh_housing();
        market.overall_happiness =
            happiness::weighted_happiness(&market.classes, &market.populations())
                .unwrap_or(happiness::NEUTRAL_MARKET);
        market
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn config(&self) -> &LaborConfig {
        &self.config
    }

    pub fn professions(&self) -> impl Iterator<Item = &Profession> {
        self.professions.values()
    }

    pub fn profession(&self, id: &str) -> Option<&Profession> {
        self.professions.get(id)
    }

    pub fn class_state(&self, class: SocialClass) -> &ClassState {
        self.classes.get(class)
    }

    pub fn overall_happiness(&self) -> f64 {
        self.overall_happiness
    }

    pub fn class_population(&self, class: SocialClass) -> u32 {
        self.professions
            .values()
            .filter(|p| p.class() == class)
            .map(|p| p.count)
            .sum()
    }

    pub fn populations(&self) -> ClassTable<u32> {
        ClassTable::new(
            self.class_population(SocialClass::Lower),
            self.class_population(SocialClass::Middle),
            self.class_population(SocialClass::Upper),
        )
    }

    pub fn total_population(&self) -> u32 {
        self.professions.values().map(|p| p.count).sum()
    }

    pub fn demand(&self, building: BuildingId) -> Option<&LaborDemand> {
        self.demands.get(building)
    }

    pub fn allocation(&self, building: BuildingId) -> Option<&WorkerRequirement> {
        self.allocations.get(building)
    }

    /// Sum of one profession's workers across every building allocation
    pub fn allocated_total(&self, profession: &str) -> u32 {
        self.allocations
            .values()
            .filter_map(|alloc| alloc.get(profession))
            .sum()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Register a building's labor demand and try to staff it in full.
    ///
    /// On failure the demand stays registered with no workers, so the next
    /// re-evaluation can still staff it partially.
    pub fn assign(
        &mut self,
        building: BuildingId,
        building_type: impl Into<BuildingTypeId>,
        requirement: WorkerRequirement,
        priority: Priority,
    ) -> Result<(), EconomyError> {
        self.release(building);
        let plan = if requirement.is_empty() {
            Ok(WorkerRequirement::new())
        } else {
            plan_assignment(&requirement, &self.professions)
        };
        self.demands.insert(
            building,
            LaborDemand {
                building_type: building_type.into(),
                requirement,
                priority,
            },
        );
        self.commit(building, plan?);
        Ok(())
    }

    /// Return a building's workers to their pools. The demand stays.
    pub fn release(&mut self, building: BuildingId) -> Option<WorkerRequirement> {
        let allocation = self.allocations.remove(building)?;
        for (id, n) in &allocation {
            if let Some(prof) = self.professions.get_mut(id) {
                prof.assigned = prof.assigned.saturating_sub(*n);
            }
        }
        Some(allocation)
    }

    /// Release a building's workers and forget its demand.
    pub fn unregister(&mut self, building: BuildingId) {
        self.release(building);
        self.demands.remove(building);
    }

    fn commit(&mut self, building: BuildingId, plan: WorkerRequirement) {
        for (id, n) in &plan {
            if let Some(prof) = self.professions.get_mut(id) {
                prof.assigned += n;
            }
        }
        self.allocations.insert(building, plan);
    }

    /// Re-staff every registered building from scratch in priority order.
    ///
    /// Buildings that cannot be fully staffed fall back to proportional
    /// staffing per priority tier.
    pub fn reevaluate_all(&mut self) {
        let buildings: Vec<BuildingId> = self.demands.keys().collect();
        for &building in &buildings {
            self.release(building);
        }

        let mut order: Vec<(Priority, BuildingId)> = buildings
            .iter()
            .filter_map(|&b| self.demands.get(b).map(|d| (d.priority, b)))
            .collect();
        order.sort();

        let mut unfulfilled = Vec::new();
        for (priority, building) in order {
            let requirement = match self.demands.get(building) {
                Some(demand) => demand.requirement.clone(),
                None => continue,
            };
            match plan_assignment(&requirement, &self.professions) {
                Ok(plan) => self.commit(building, plan),
                Err(err) => {
                    tracing::debug!(target: "labor", error = %err, "full staffing failed");
                    unfulfilled.push((priority, building));
                }
            }
        }

        if !unfulfilled.is_empty() {
            self.proportional_fallback(&unfulfilled);
        }
    }

    fn proportional_fallback(&mut self, unfulfilled: &[(Priority, BuildingId)]) {
        for tier in Priority::all() {
            let tier_buildings: Vec<BuildingId> = unfulfilled
                .iter()
                .filter(|(p, _)| *p == tier)
                .map(|(_, b)| *b)
                .collect();
            if tier_buildings.is_empty() {
                continue;
            }

            let mut required = ClassTable::splat(0u32);
            for &building in &tier_buildings {
                let Some(demand) = self.demands.get(building) else {
                    continue;
                };
                match class_requirements(&demand.requirement, &self.professions) {
                    Ok(need) => {
                        for class in SocialClass::all() {
                            *required.get_mut(class) += need.get(class);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(target: "labor", error = %err, "demand skipped");
                    }
                }
            }
            let ratios = allocation_ratios(&required, &class_availability(&self.professions));

            for building in tier_buildings {
                let Some(demand) = self.demands.get(building) else {
                    continue;
                };
                let scaled = scale_requirement(&demand.requirement, &ratios, &self.professions);
                if scaled.is_empty() {
                    continue;
                }
                match plan_assignment(&scaled, &self.professions) {
                    Ok(plan) => self.commit(building, plan),
                    Err(err) => {
                        tracing::debug!(target: "labor", error = %err, "partial staffing failed");
                    }
                }
            }
        }
    }

    // ========================================================================
    // Population
    // ========================================================================

    /// Add workers to a profession. Newcomers pull class happiness toward
    /// the incoming happiness, weighted by head count.
    pub fn add_population(&mut self, profession: &str, amount: u32) -> Result<u32, EconomyError> {
        let incoming = self.happiness_config.incoming_happiness;
        self.enroll(profession, amount, incoming)
    }

    /// Add workers who bring `sentiment` into the class market factor.
    fn enroll(&mut self, profession: &str, amount: u32, sentiment: f64) -> Result<u32, EconomyError> {
        let class = self
            .professions
            .get(profession)
            .map(Profession::class)
            .ok_or_else(|| EconomyError::UnknownProfession(profession.to_string()))?;
        if amount == 0 {
            return Ok(0);
        }

        let existing = self.class_population(class);
        self.classes
            .get_mut(class)
            .absorb_population(existing, amount, sentiment);
        if let Some(prof) = self.professions.get_mut(profession) {
            prof.count += amount;
        }
        self.refresh_class(class);
        Ok(amount)
    }

    /// Remove up to `amount` workers from a profession.
    ///
    /// Unassigned workers go first; the rest are pulled out of allocations,
    /// lowest priority buildings first. Returns how many were removed.
    pub fn remove_workers(&mut self, profession: &str, amount: u32) -> u32 {
        let Some(prof) = self.professions.get(profession) else {
            tracing::warn!(target: "labor", profession, "remove from unknown profession ignored");
            return 0;
        };
        let amount = amount.min(prof.count);
        let free = prof.free();
        if amount > free {
            self.strip_allocations(profession, amount - free);
        }
        if let Some(prof) = self.professions.get_mut(profession) {
            prof.count -= amount;
            prof.assigned = prof.assigned.min(prof.count);
        }
        amount
    }

    fn strip_allocations(&mut self, profession: &str, mut amount: u32) {
        let mut holders: Vec<(Reverse<Priority>, BuildingId)> = self
            .allocations
            .iter()
            .filter(|(_, alloc)| alloc.get(profession).is_some_and(|n| *n > 0))
            .map(|(b, _)| {
                let priority = self.demands.get(b).map(|d| d.priority).unwrap_or_default();
                (Reverse(priority), b)
            })
            .collect();
        holders.sort();

        for (_, building) in holders {
            if amount == 0 {
                break;
            }
            let Some(alloc) = self.allocations.get_mut(building) else {
                continue;
            };
            let Some(slot) = alloc.get_mut(profession) else {
                continue;
            };
            let take = (*slot).min(amount);
            *slot -= take;
            if *slot == 0 {
                alloc.remove(profession);
            }
            amount -= take;
            if let Some(prof) = self.professions.get_mut(profession) {
                prof.assigned = prof.assigned.saturating_sub(take);
            }
        }
    }

    /// Remove people from a class, free workers first, largest pools first.
    fn remove_from_class(&mut self, class: SocialClass, amount: u32) -> u32 {
        let mut left = amount;

        let mut by_free: Vec<(u32, ProfessionId)> = self
            .professions
            .values()
            .filter(|p| p.class() == class)
            .map(|p| (p.free(), p.id().clone()))
            .collect();
        by_free.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        for (free, id) in by_free {
            if left == 0 {
                break;
            }
            left -= self.remove_workers(&id, free.min(left));
        }

        if left > 0 {
            let mut by_count: Vec<(u32, ProfessionId)> = self
                .professions
                .values()
                .filter(|p| p.class() == class)
                .map(|p| (p.count, p.id().clone()))
                .collect();
            by_count.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            for (count, id) in by_count {
                if left == 0 {
                    break;
                }
                left -= self.remove_workers(&id, count.min(left));
            }
        }

        self.refresh_class(class);
        amount - left
    }

    fn add_to_class(&mut self, class: SocialClass, amount: u32, sentiment: f64) -> u32 {
        let entry = self.config.entry_professions.get(class).clone();
        match self.enroll(&entry, amount, sentiment) {
            Ok(added) => added,
            Err(err) => {
                tracing::warn!(target: "population", error = %err, "entry profession missing");
                0
            }
        }
    }

    // ========================================================================
    // Housing & Happiness
    // ========================================================================

    pub fn add_housing(&mut self, class: SocialClass, capacity: u32) {
        self.classes.get_mut(class).housing_capacity += capacity;
        self.refresh_class(class);
    }

    pub fn remove_housing(&mut self, class: SocialClass, capacity: u32) {
        let state = self.classes.get_mut(class);
        state.housing_capacity = state.housing_capacity.saturating_sub(capacity);
        self.refresh_class(class);
    }

    /// Feed one consumption round into the market factor of each class.
    pub fn apply_market_results(
        &mut self,
        impacts: &ClassTable<f64>,
        satisfaction: ClassTable<BTreeMap<DemandId, DemandSatisfaction>>,
    ) {
        let blend = self.happiness_config.market_blend;
        let ClassTable {
            lower,
            middle,
            upper,
        } = satisfaction;
        for (class, demands) in [
            (SocialClass::Lower, lower),
            (SocialClass::Middle, middle),
            (SocialClass::Upper, upper),
        ] {
            let state = self.classes.get_mut(class);
            state.apply_market_impact(*impacts.get(class), blend);
            state.demand_satisfaction = demands;
            self.refresh_class(class);
        }
    }

    fn refresh_class(&mut self, class: SocialClass) {
        let population = self.class_population(class);
        let comfort = *self.happiness_config.comfort.get(class);
        let weights = self.happiness_config.weights;
        let state = self.classes.get_mut(class);
        state.update_housing(population, &comfort);
        state.refresh(&weights);
    }

    fn refresh_housing(&mut self) {
        for class in SocialClass::all() {
            self.refresh_class(class);
        }
    }

    fn blend_overall(&mut self) {
        if let Some(target) = happiness::weighted_happiness(&self.classes, &self.populations()) {
            self.overall_happiness += (target - self.overall_happiness)
                * self.happiness_config.overall_blend.clamp(0.0, 1.0);
            self.overall_happiness = self.overall_happiness.clamp(0.0, happiness::MAX_HAPPINESS);
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance every labor cadence by `delta` simulated milliseconds.
    pub fn tick(
        &mut self,
        now: Millis,
        delta: Millis,
        pool: &mut ResourcePool,
        rng: &mut impl Rng,
    ) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if delta <= 0.0 {
            return events;
        }
        self.refresh_housing();

        let experience_rounds = self.experience_timer.advance(delta);
        if experience_rounds > 0 {
            for prof in self.professions.values_mut() {
                prof.experience +=
                    self.config.experience_rate * prof.assigned as f64 * experience_rounds as f64;
            }
            for _ in 0..experience_rounds {
                self.blend_overall();
            }

            #[cfg(feature = "instrument")]
            {
                let populations = self.populations();
                for (class, state) in self.classes.iter() {
                    tracing::info!(
                        target: "population",
                        now = now,
                        class = ?class,
                        population = *populations.get(class) as u64,
                        happiness = state.happiness,
                        housing = state.factors.housing,
                        market = state.factors.market,
                        overall = self.overall_happiness,
                    );
                }
            }
        }

        if self.reevaluation_timer.advance(delta) > 0 {
            self.reevaluate_all();

            #[cfg(feature = "instrument")]
            {
                let staffed = self
                    .allocations
                    .values()
                    .filter(|alloc| !alloc.is_empty())
                    .count();
                tracing::info!(
                    target: "labor",
                    now = now,
                    buildings = self.demands.len() as u64,
                    staffed = staffed as u64,
                    population = self.total_population() as u64,
                );
            }
        }

        for _ in 0..self.promotion_timer.advance(delta) {
            self.run_promotions(pool, rng, &mut events);
            self.run_demotions(rng, &mut events);
        }

        for _ in 0..self.dynamics_timer.advance(delta) {
            self.run_class_dynamics(rng, &mut events);
        }

        events
    }

    fn run_promotions(&mut self, pool: &mut ResourcePool, rng: &mut impl Rng, events: &mut Vec<SimEvent>) {
        let candidates: Vec<(ProfessionId, ProfessionId)> = self
            .professions
            .values()
            .filter_map(|p| p.def.promotes_to.clone().map(|to| (p.id().clone(), to)))
            .collect();

        for (from, to) in candidates {
            let Some(target_class) = self.professions.get(&to).map(Profession::class) else {
                tracing::warn!(target: "labor", from = from.as_str(), to = to.as_str(), "promotion target unknown");
                continue;
            };
            let Some(source) = self.professions.get(&from) else {
                continue;
            };
            if source.class() != target_class {
                tracing::warn!(target: "labor", from = from.as_str(), to = to.as_str(), "promotion crosses classes");
                continue;
            }
            let batch = source.batch_size();
            if batch == 0
                || source.experience < source.def.promotion_threshold
                || self.overall_happiness < source.def.required_happiness
            {
                continue;
            }
            let cost: ResourceBundle = source
                .def
                .promotion_cost
                .iter()
                .map(|(r, q)| (r.clone(), q * batch as f64))
                .collect();
            if !pool.has_resources(&cost) {
                tracing::debug!(target: "labor", profession = from.as_str(), "promotion unaffordable");
                continue;
            }
            if rng.random::<f64>() >= source.def.promotion_chance {
                continue;
            }

            pool.consume_resources(&cost);
            if let Some(source) = self.professions.get_mut(&from) {
                source.count -= batch;
                source.experience = 0.0;
            }
            if let Some(target) = self.professions.get_mut(&to) {
                target.count += batch;
            }
            tracing::debug!(target: "labor", from = from.as_str(), to = to.as_str(), count = batch, "promoted");
            events.push(SimEvent::ProfessionPromoted { from, to, count: batch });
        }
    }

    fn run_demotions(&mut self, rng: &mut impl Rng, events: &mut Vec<SimEvent>) {
        let candidates: Vec<(ProfessionId, ProfessionId)> = self
            .professions
            .values()
            .filter_map(|p| p.def.demotes_to.clone().map(|to| (p.id().clone(), to)))
            .collect();

        for (from, to) in candidates {
            let Some(target_class) = self.professions.get(&to).map(Profession::class) else {
                tracing::warn!(target: "labor", from = from.as_str(), to = to.as_str(), "demotion target unknown");
                continue;
            };
            let Some(source) = self.professions.get(&from) else {
                continue;
            };
            if source.class() != target_class {
                tracing::warn!(target: "labor", from = from.as_str(), to = to.as_str(), "demotion crosses classes");
                continue;
            }
            let class = source.class();
            let crowded = self
                .classes
                .get(class)
                .is_overcrowded(self.class_population(class));
            let unhappy = self.overall_happiness < self.config.demotion_threshold;
            let batch = source.batch_size();
            if batch == 0 || !(crowded || unhappy) {
                continue;
            }
            if rng.random::<f64>() >= source.def.demotion_chance {
                continue;
            }

            if let Some(source) = self.professions.get_mut(&from) {
                source.count -= batch;
            }
            if let Some(target) = self.professions.get_mut(&to) {
                target.count += batch;
            }
            events.push(SimEvent::ProfessionDemoted { from, to, count: batch });
        }
    }

    fn run_class_dynamics(&mut self, rng: &mut impl Rng, events: &mut Vec<SimEvent>) {
        let happiness = ClassTable::new(
            self.classes.lower.happiness,
            self.classes.middle.happiness,
            self.classes.upper.happiness,
        );
        let shifts = dynamics::roll_class_dynamics(
            &happiness,
            &self.populations(),
            self.overall_happiness,
            &self.config,
            rng,
        );

        for shift in shifts {
            match shift {
                ClassShift::Loss { class, amount } => {
                    let removed = self.remove_from_class(class, amount);
                    push_population(events, class, -(removed as i64), PopulationChangeReason::Emigration);
                }
                ClassShift::Demotion { from, amount } => {
                    let Some(to) = from.below() else { continue };
                    let sentiment = self.classes.get(from).factors.market;
                    let moved = self.remove_from_class(from, amount);
                    let added = self.add_to_class(to, moved, sentiment);
                    push_population(events, from, -(moved as i64), PopulationChangeReason::ClassDemotion);
                    push_population(events, to, added as i64, PopulationChangeReason::ClassDemotion);
                }
                ClassShift::Mobility { from, amount } => {
                    let Some(to) = from.above() else { continue };
                    let sentiment = self.classes.get(from).factors.market;
                    let moved = self.remove_from_class(from, amount);
                    let added = self.add_to_class(to, moved, sentiment);
                    push_population(events, from, -(moved as i64), PopulationChangeReason::UpwardMobility);
                    push_population(events, to, added as i64, PopulationChangeReason::UpwardMobility);
                }
                ClassShift::Immigration { amount } => {
                    let incoming = self.happiness_config.incoming_happiness;
                    let added = self.add_to_class(SocialClass::Lower, amount, incoming);
                    push_population(events, SocialClass::Lower, added as i64, PopulationChangeReason::Immigration);
                }
            }
        }
    }
}

fn push_population(events: &mut Vec<SimEvent>, class: SocialClass, delta: i64, reason: PopulationChangeReason) {
    if delta == 0 {
        return;
    }
    tracing::debug!(target: "population", class = ?class, delta, reason = ?reason, "population changed");
    events.push(SimEvent::PopulationChanged { class, delta, reason });
}

impl Workforce for LaborMarket {
    /// Buildings without a labor demand never wait for workers.
    fn has_sufficient_workers(&self, building: BuildingId) -> bool {
        match self.demands.get(building) {
            None => true,
            Some(demand) if total_workers(&demand.requirement) == 0 => true,
            Some(_) => self
                .allocations
                .get(building)
                .is_some_and(|alloc| total_workers(alloc) > 0),
        }
    }

    /// Staffing ratio times the average profession multiplier of the staff.
    fn efficiency_multiplier(&self, building: BuildingId) -> f64 {
        let Some(demand) = self.demands.get(building) else {
            return 1.0;
        };
        let required = total_workers(&demand.requirement);
        if required == 0 {
            return 1.0;
        }
        let Some(alloc) = self.allocations.get(building) else {
            return 0.0;
        };
        let weighted: f64 = alloc
            .iter()
            .map(|(id, n)| {
                let multiplier = self
                    .professions
                    .get(id)
                    .map(|p| p.def.production_multiplier)
                    .unwrap_or(1.0);
                *n as f64 * multiplier
            })
            .sum();
        weighted / required as f64
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use slotmap::SlotMap;

    use super::*;
    use crate::resources::{ResourceDef, TierCaps};
    use crate::types::Tier;

    fn make_ids(n: usize) -> Vec<BuildingId> {
        let mut keys: SlotMap<BuildingId, ()> = SlotMap::with_key();
        (0..n).map(|_| keys.insert(())).collect()
    }

    fn req(items: &[(&str, u32)]) -> WorkerRequirement {
        items.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    fn small_market() -> LaborMarket {
        LaborMarket::new(
            vec![
                ProfessionDef::new("laborer", SocialClass::Lower).with_count(10),
                ProfessionDef::new("farmer", SocialClass::Lower).with_count(4),
                ProfessionDef::new("engineer", SocialClass::Upper)
                    .with_multiplier(1.5)
                    .with_count(2),
            ],
            LaborConfig::default(),
            HappinessConfig::default(),
        )
    }

    fn assert_consistent(market: &LaborMarket) {
        for prof in market.professions() {
            assert!(prof.assigned <= prof.count, "{} over-assigned", prof.id());
            assert_eq!(market.allocated_total(prof.id()), prof.assigned, "{}", prof.id());
        }
    }

    #[test]
    fn test_assign_then_release_restores_counts() {
        let mut market = small_market();
        let ids = make_ids(1);
        let before: Vec<u32> = market.professions().map(|p| p.assigned).collect();

        market
            .assign(ids[0], "farm", req(&[("farmer", 6)]), Priority::High)
            .unwrap();
        assert_eq!(market.profession("farmer").unwrap().assigned, 4);
        assert_eq!(market.profession("laborer").unwrap().assigned, 2);
        assert_consistent(&market);

        market.release(ids[0]);
        let after: Vec<u32> = market.professions().map(|p| p.assigned).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_failed_assign_leaves_nothing_assigned() {
        let mut market = small_market();
        let ids = make_ids(1);
        let err = market
            .assign(
                ids[0],
                "lab",
                req(&[("laborer", 2), ("engineer", 3)]),
                Priority::Medium,
            )
            .unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientWorkers { .. }));
        assert_eq!(market.profession("laborer").unwrap().assigned, 0);
        assert!(!market.has_sufficient_workers(ids[0]));
        assert_eq!(market.efficiency_multiplier(ids[0]), 0.0);
    }

    #[test]
    fn test_efficiency_reflects_staff_mix() {
        let mut market = small_market();
        let ids = make_ids(2);
        market
            .assign(ids[0], "lab", req(&[("engineer", 2)]), Priority::Medium)
            .unwrap();
        assert!((market.efficiency_multiplier(ids[0]) - 1.5).abs() < 1e-9);

        // No registered demand: always staffed at full speed
        assert!(market.has_sufficient_workers(ids[1]));
        assert_eq!(market.efficiency_multiplier(ids[1]), 1.0);
    }

    #[test]
    fn test_reevaluation_falls_back_to_proportional_staffing() {
        let mut market = small_market();
        let ids = make_ids(2);
        // 14 lower class workers, 20 requested across two medium buildings
        let _ = market.assign(ids[0], "quarry", req(&[("laborer", 10)]), Priority::Medium);
        let _ = market.assign(ids[1], "mill", req(&[("laborer", 10)]), Priority::Medium);

        market.reevaluate_all();
        assert_consistent(&market);

        // First building fills fully, the second gets floor(10 * 4/10)
        assert_eq!(total_workers(market.allocation(ids[0]).unwrap()), 10);
        assert_eq!(total_workers(market.allocation(ids[1]).unwrap()), 4);
        assert!(market.has_sufficient_workers(ids[1]));
        assert!((market.efficiency_multiplier(ids[1]) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_high_priority_staffed_first() {
        let mut market = small_market();
        let ids = make_ids(2);
        let _ = market.assign(ids[0], "quarry", req(&[("laborer", 10)]), Priority::Low);
        let _ = market.assign(ids[1], "farm", req(&[("farmer", 14)]), Priority::High);

        market.reevaluate_all();
        assert_eq!(total_workers(market.allocation(ids[1]).unwrap()), 14);
        assert!(!market.has_sufficient_workers(ids[0]));
        assert_consistent(&market);
    }

    #[test]
    fn test_remove_workers_strips_low_priority_first() {
        let mut market = small_market();
        let ids = make_ids(2);
        market
            .assign(ids[0], "farm", req(&[("laborer", 5)]), Priority::High)
            .unwrap();
        market
            .assign(ids[1], "quarry", req(&[("laborer", 5)]), Priority::Low)
            .unwrap();

        assert_eq!(market.remove_workers("laborer", 3), 3);
        assert_eq!(market.allocation(ids[0]).unwrap()["laborer"], 5);
        assert_eq!(market.allocation(ids[1]).unwrap()["laborer"], 2);
        assert_consistent(&market);

        assert_eq!(market.remove_workers("laborer", 100), 7);
        assert_eq!(market.profession("laborer").unwrap().count, 0);
        assert_consistent(&market);
        assert_eq!(market.remove_workers("wizard", 1), 0);
    }

    #[test]
    fn test_add_population_blends_market_sentiment() {
        let mut market = small_market();
        let before = market.class_state(SocialClass::Lower).factors.market;
        assert_eq!(market.add_population("laborer", 14), Ok(14));
        let after = market.class_state(SocialClass::Lower).factors.market;
        // 14 existing at 50, 14 incoming at 80
        assert!((after - (before + 80.0) / 2.0).abs() < 1e-9);
        assert_eq!(market.class_population(SocialClass::Lower), 28);
        assert!(market.add_population("wizard", 1).is_err());
    }

    #[test]
    fn test_experience_accrues_only_to_assigned() {
        let mut market = small_market();
        let ids = make_ids(1);
        market
            .assign(ids[0], "farm", req(&[("farmer", 4)]), Priority::High)
            .unwrap();
        let mut pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(1);

        market.tick(1000.0, 1000.0, &mut pool, &mut rng);
        assert_eq!(market.profession("farmer").unwrap().experience, 4.0);
        assert_eq!(market.profession("laborer").unwrap().experience, 0.0);
    }

    #[test]
    fn test_zero_delta_tick_changes_nothing() {
        let mut market = small_market();
        let mut pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(1);
        let overall = market.overall_happiness();
        for _ in 0..10 {
            assert!(market.tick(0.0, 0.0, &mut pool, &mut rng).is_empty());
        }
        assert_eq!(market.overall_happiness(), overall);
    }

    #[test]
    fn test_promotion_spends_resources() {
        let mut market = LaborMarket::new(
            vec![
                ProfessionDef::new("laborer", SocialClass::Lower)
                    .with_count(20)
                    .promotes_to("miner", 0.0, 0.0, 1.0)
                    .with_promotion_cost("tools", 1.0),
                ProfessionDef::new("miner", SocialClass::Lower),
            ],
            LaborConfig::default(),
            HappinessConfig::default(),
        );
        let mut pool = ResourcePool::new(&[ResourceDef::new("tools", Tier::Advanced, 10.0)], &TierCaps::default());
        let mut rng = StdRng::seed_from_u64(5);

        let events = market.tick(5000.0, 5000.0, &mut pool, &mut rng);
        // 10% of 20 free laborers, one tool each
        assert!(events.contains(&SimEvent::ProfessionPromoted {
            from: "laborer".into(),
            to: "miner".into(),
            count: 2,
        }));
        assert_eq!(market.profession("miner").unwrap().count, 2);
        assert_eq!(pool.value("tools"), 8.0);
    }

    fn mining_market() -> LaborMarket {
        LaborMarket::new(
            vec![
                ProfessionDef::new("laborer", SocialClass::Lower),
                ProfessionDef::new("miner", SocialClass::Lower)
                    .with_count(30)
                    .demotes_to("laborer", 1.0),
            ],
            LaborConfig::default(),
            HappinessConfig::default(),
        )
    }

    #[test]
    fn test_overcrowding_demotes_free_workers() {
        let mut market = mining_market();
        let ids = make_ids(1);
        market
            .assign(ids[0], "mine", req(&[("miner", 10)]), Priority::High)
            .unwrap();
        market.remove_housing(SocialClass::Lower, 100);
        assert!(market.class_state(SocialClass::Lower).is_overcrowded(30));
        let mut pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(3);

        let events = market.tick(5000.0, 5000.0, &mut pool, &mut rng);
        assert!(market.overall_happiness() >= market.config().demotion_threshold);
        // 10% of the 20 free miners; the 10 at the mine stay put
        assert!(events.contains(&SimEvent::ProfessionDemoted {
            from: "miner".into(),
            to: "laborer".into(),
            count: 2,
        }));
        let miner = market.profession("miner").unwrap();
        assert_eq!(miner.count, 28);
        assert_eq!(miner.assigned, 10);
        assert_eq!(market.profession("laborer").unwrap().count, 2);
        assert_eq!(market.allocated_total("miner"), 10);
    }

    #[test]
    fn test_unhappy_city_demotes() {
        let mut market = mining_market();
        let mut pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(3);

        // Housed and content: nothing moves
        let events = market.tick(5000.0, 5000.0, &mut pool, &mut rng);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::ProfessionDemoted { .. })));
        assert_eq!(market.profession("miner").unwrap().count, 30);

        market.overall_happiness = 10.0;
        let events = market.tick(10000.0, 5000.0, &mut pool, &mut rng);
        assert!(market.overall_happiness() < market.config().demotion_threshold);
        assert!(!market.class_state(SocialClass::Lower).is_overcrowded(30));
        assert!(events.contains(&SimEvent::ProfessionDemoted {
            from: "miner".into(),
            to: "laborer".into(),
            count: 3,
        }));
        assert_eq!(market.profession("laborer").unwrap().count, 3);
    }

    #[test]
    fn test_ladder_across_classes_is_skipped() {
        let mut market = LaborMarket::new(
            vec![
                ProfessionDef::new("laborer", SocialClass::Lower)
                    .with_count(20)
                    .promotes_to("clerk", 0.0, 0.0, 1.0),
                ProfessionDef::new("clerk", SocialClass::Middle),
            ],
            LaborConfig::default(),
            HappinessConfig::default(),
        );
        let mut pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(5);

        let events = market.tick(5000.0, 5000.0, &mut pool, &mut rng);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::ProfessionPromoted { .. })));
        assert_eq!(market.profession("laborer").unwrap().count, 20);
        assert_eq!(market.profession("clerk").unwrap().count, 0);
    }

    #[test]
    fn test_class_move_carries_source_sentiment() {
        let mut market = small_market();
        let before = market.class_state(SocialClass::Lower).factors.market;
        // 14 existing plus 14 arriving with no market sentiment
        assert_eq!(market.add_to_class(SocialClass::Lower, 14, 0.0), 14);
        let after = market.class_state(SocialClass::Lower).factors.market;
        assert!((after - before / 2.0).abs() < 1e-9);
        assert_eq!(market.class_population(SocialClass::Lower), 28);
    }

    #[test]
    fn test_apply_market_results_moves_class() {
        let mut market = small_market();
        let before = market.class_state(SocialClass::Upper).happiness;
        let mut satisfaction: ClassTable<BTreeMap<DemandId, DemandSatisfaction>> = ClassTable::default();
        satisfaction.upper.insert("food".into(), DemandSatisfaction::default());
        market.apply_market_results(&ClassTable::new(0.0, 0.0, -20.0), satisfaction);

        let upper = market.class_state(SocialClass::Upper);
        assert!(upper.happiness < before);
        assert!(upper.demand_satisfaction.contains_key("food"));
        assert!((0.0..=100.0).contains(&upper.happiness));
    }
}
