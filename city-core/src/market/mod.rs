// Trade market: prices, inflation, local events, consumption and taxation

pub mod consumption;
pub mod goods;
pub mod pricing;
pub mod tax;
pub mod trade;

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::Cadence;
use crate::error::EconomyError;
use crate::resources::ResourcePool;
use crate::types::{ClassTable, Millis, Price, ResourceId, ServiceId};

pub use consumption::{ConsumptionReport, DemandDef, PriceQuote, default_demand_defs};
pub use goods::{
    GoodDef, PriceHistory, PricedGood, PricedService, ServiceDef, default_good_defs,
    default_service_defs,
};
pub use pricing::{InflationState, LocalEvent};
pub use tax::{TaxEvent, TaxLedger};
pub use trade::TradeOutcome;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub fluctuation_interval: Millis,
    pub consumption_interval: Millis,
    pub tax_rate: f64,
    /// Share of the current price paid out on player sales
    pub sell_spread: f64,
    /// Fraction of the gap to half capacity restored per fluctuation
    pub restock_fraction: f64,
    pub history_len: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fluctuation_interval: 5_000.0,
            consumption_interval: 10_000.0,
            tax_rate: 0.1,
            sell_spread: 0.9,
            restock_fraction: 0.05,
            history_len: 32,
        }
    }
}

/// What one market tick produced
#[derive(Debug, Clone, Default)]
pub struct MarketTick {
    pub consumption: Vec<ConsumptionReport>,
    pub expired_events: Vec<String>,
}

// ============================================================================
// Trade Market
// ============================================================================

#[derive(Debug, Clone)]
pub struct TradeMarket {
    config: MarketConfig,
    goods: BTreeMap<ResourceId, PricedGood>,
    services: BTreeMap<ServiceId, PricedService>,
    demands: Vec<DemandDef>,
    inflation: InflationState,
    events: Vec<LocalEvent>,
    tax: TaxLedger,
    fluctuation_timer: Cadence,
    consumption_timer: Cadence,
}

impl TradeMarket {
    pub fn new(
        goods: &[GoodDef],
        services: &[ServiceDef],
        demands: Vec<DemandDef>,
        config: MarketConfig,
    ) -> Self {
        let history_len = config.history_len;
        Self {
            goods: goods
                .iter()
                .map(|def| (def.id.clone(), PricedGood::new(def, history_len)))
                .collect(),
            services: services
                .iter()
                .map(|def| (def.id.clone(), PricedService::new(def, history_len)))
                .collect(),
            demands,
            inflation: InflationState::new(history_len),
            events: Vec::new(),
            tax: TaxLedger::new(config.tax_rate),
            fluctuation_timer: Cadence::new(config.fluctuation_interval),
            consumption_timer: Cadence::new(config.consumption_interval),
            config,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn good(&self, id: &str) -> Option<&PricedGood> {
        self.goods.get(id)
    }

    pub fn good_mut(&mut self, id: &str) -> Option<&mut PricedGood> {
        self.goods.get_mut(id)
    }

    pub fn goods(&self) -> impl Iterator<Item = &PricedGood> {
        self.goods.values()
    }

    pub fn service(&self, id: &str) -> Option<&PricedService> {
        self.services.get(id)
    }

    pub fn services(&self) -> impl Iterator<Item = &PricedService> {
        self.services.values()
    }

    pub fn demands(&self) -> &[DemandDef] {
        &self.demands
    }

    /// Current price of a good or service
    pub fn price(&self, id: &str) -> Option<Price> {
        self.goods
            .get(id)
            .map(|g| g.current_price)
            .or_else(|| self.services.get(id).map(|s| s.current_price))
    }

    pub fn inflation(&self) -> &InflationState {
        &self.inflation
    }

    pub fn inflation_rate(&self) -> f64 {
        self.inflation.rate
    }

    pub fn tax(&self) -> &TaxLedger {
        &self.tax
    }

    pub fn revenue(&self) -> f64 {
        self.tax.revenue
    }

    // ========================================================================
    // Local Events
    // ========================================================================

    pub fn add_local_event(&mut self, event: LocalEvent) -> Result<(), EconomyError> {
        if !(event.duration >= 0.0) {
            return Err(EconomyError::InvalidAmount(event.duration));
        }
        if let Some(bad) = event
            .price_modifiers
            .values()
            .find(|m| !(m.is_finite() && **m > 0.0))
        {
            return Err(EconomyError::InvalidAmount(*bad));
        }
        tracing::debug!(target: "market", event = event.id.as_str(), start = event.start_time, "local event added");
        self.events.push(event);
        Ok(())
    }

    pub fn local_events(&self) -> &[LocalEvent] {
        &self.events
    }

    pub fn active_events(&self, now: Millis) -> impl Iterator<Item = &LocalEvent> {
        self.events.iter().filter(move |e| e.is_active(now))
    }

    /// Drop expired events and return their ids.
    pub fn purge_expired(&mut self, now: Millis) -> Vec<String> {
        let mut expired = Vec::new();
        self.events.retain(|e| {
            if e.is_expired(now) {
                expired.push(e.id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    // ========================================================================
    // Pricing
    // ========================================================================

    /// Recompute every good and service price.
    pub fn update_prices(&mut self, now: Millis, pool: &ResourcePool, rng: &mut impl Rng) {
        for good in self.goods.values_mut() {
            good.supply = pricing::combined_supply(good.inventory_ratio(), pool.fill_ratio(&good.id));
            let price = pricing::supply_price(good.base_price, good.supply)
                * pricing::noise(rng, good.volatility)
                * pricing::event_multiplier(&self.events, &good.id, now);
            good.set_price(pricing::floor_price(price));
            good.history.push(good.current_price);
        }

        self.inflation.observe(
            self.goods
                .values()
                .filter(|g| g.base_price > 0.0)
                .map(|g| g.current_price / g.base_price),
        );

        let rate = self.inflation.rate;
        for service in self.services.values_mut() {
            let price = service.base_price
                * rate
                * pricing::event_multiplier(&self.events, &service.id, now)
                * pricing::noise(rng, service.volatility);
            service.current_price = pricing::floor_price(price);
            service.history.push(service.current_price);
        }

        #[cfg(feature = "instrument")]
        {
            for good in self.goods.values() {
                tracing::info!(
                    target: "market",
                    now = now,
                    good = good.id.as_str(),
                    price = good.current_price,
                    base_price = good.base_price,
                    supply = good.supply,
                    inventory = good.inventory,
                    inflation = rate,
                );
            }
        }
    }

    fn restock(&mut self) {
        let fraction = self.config.restock_fraction;
        for good in self.goods.values_mut() {
            good.restock(fraction);
        }
    }

    // ========================================================================
    // Consumption & Tax
    // ========================================================================

    /// Let every class consume its demands and bank the spending.
    pub fn run_consumption(
        &mut self,
        populations: &ClassTable<u32>,
        pool: &mut ResourcePool,
    ) -> ConsumptionReport {
        let goods = &self.goods;
        let report = consumption::consume(&self.demands, populations, pool, |id| {
            goods.get(id).map(|g| PriceQuote {
                current: g.current_price,
                base: g.base_price,
            })
        });
        self.tax.record(report.spending);
        report
    }

    pub fn process_monthly_tax(&mut self) -> TaxEvent {
        let event = self.tax.process_monthly_tax();
        tracing::info!(
            target: "tax",
            tax_amount = event.tax_amount,
            revenue = event.revenue,
        );
        event
    }

    /// Collect tax when `month` differs from the last observed month.
    pub fn observe_month(&mut self, month: u32) -> Option<TaxEvent> {
        let event = self.tax.observe_month(month)?;
        tracing::info!(
            target: "tax",
            month = month as u64,
            tax_amount = event.tax_amount,
            revenue = event.revenue,
        );
        Some(event)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn tick(
        &mut self,
        now: Millis,
        delta: Millis,
        pool: &mut ResourcePool,
        populations: &ClassTable<u32>,
        rng: &mut impl Rng,
    ) -> MarketTick {
        let mut out = MarketTick::default();
        if delta <= 0.0 {
            return out;
        }

        out.expired_events = self.purge_expired(now);

        let fluctuations = self.fluctuation_timer.advance(delta);
        for _ in 0..fluctuations {
            self.restock();
        }
        if fluctuations > 0 {
            self.update_prices(now, pool, rng);
        }

        for _ in 0..self.consumption_timer.advance(delta) {
            let report = self.run_consumption(populations, pool);

            #[cfg(feature = "instrument")]
            {
                for (class, impact) in report.impacts.iter() {
                    tracing::info!(
                        target: "market",
                        now = now,
                        class = ?class,
                        impact = *impact,
                        spending = report.spending,
                    );
                }
            }

            out.consumption.push(report);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::resources::{ResourceDef, TierCaps};
    use crate::types::Tier;

    fn make_market() -> TradeMarket {
        TradeMarket::new(
            &[
                GoodDef::new("ore", 8.0).with_volatility(0.0),
                GoodDef::new("food", 4.0),
            ],
            &[ServiceDef::new("healthcare", 30.0)],
            default_demand_defs(),
            MarketConfig::default(),
        )
    }

    fn make_pool() -> ResourcePool {
        ResourcePool::new(
            &[
                ResourceDef::new("ore", Tier::Raw, 500.0),
                ResourceDef::new("food", Tier::Raw, 300.0),
            ],
            &TierCaps::default(),
        )
    }

    #[test]
    fn test_price_follows_supply() {
        let mut market = make_market();
        let pool = make_pool();
        let mut rng = StdRng::seed_from_u64(1);

        // Market half full, player half full: supply 0.5
        market.update_prices(0.0, &pool, &mut rng);
        assert!((market.good("ore").unwrap().current_price - 10.0).abs() < 1e-9);

        market.good_mut("ore").unwrap().inventory = 0.0;
        market.update_prices(0.0, &pool, &mut rng);
        // supply 0.15 -> 8 * (0.5 + 0.85 * 1.5)
        assert!((market.good("ore").unwrap().current_price - 14.2).abs() < 1e-9);
    }

    #[test]
    fn test_events_multiply_and_expire() {
        let mut market = make_market();
        let pool = make_pool();
        let mut rng = StdRng::seed_from_u64(1);
        market
            .add_local_event(LocalEvent::new("strike", 0.0, 1000.0).with_modifier("ore", 2.0))
            .unwrap();
        market
            .add_local_event(LocalEvent::new("boom", 0.0, 5000.0).with_modifier("ore", 1.5))
            .unwrap();

        market.update_prices(500.0, &pool, &mut rng);
        assert!((market.good("ore").unwrap().current_price - 30.0).abs() < 1e-9);

        assert_eq!(market.purge_expired(1000.5), vec!["strike".to_string()]);
        market.update_prices(1000.5, &pool, &mut rng);
        assert!((market.good("ore").unwrap().current_price - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_events_rejected() {
        let mut market = make_market();
        assert!(market.add_local_event(LocalEvent::new("x", 0.0, -1.0)).is_err());
        assert!(
            market
                .add_local_event(LocalEvent::new("y", 0.0, 10.0).with_modifier("ore", 0.0))
                .is_err()
        );
        assert!(market.local_events().is_empty());
    }

    #[test]
    fn test_services_follow_inflation() {
        let mut market = make_market();
        let pool = ResourcePool::default();
        let mut rng = StdRng::seed_from_u64(9);
        for good in ["ore", "food"] {
            market.good_mut(good).unwrap().inventory = 0.0;
        }
        for _ in 0..20 {
            market.update_prices(0.0, &pool, &mut rng);
        }
        assert!(market.inflation_rate() > 1.5);
        assert!(market.service("healthcare").unwrap().current_price > 30.0);
    }

    #[test]
    fn test_consumption_accrues_revenue() {
        let mut market = make_market();
        let mut pool = make_pool();
        let report = market.run_consumption(&ClassTable::new(100, 0, 0), &mut pool);
        assert!(report.spending > 0.0);
        assert_eq!(market.revenue(), report.spending);
    }

    #[test]
    fn test_tick_cadences() {
        let mut market = make_market();
        let mut pool = make_pool();
        let mut rng = StdRng::seed_from_u64(3);
        let populations = ClassTable::new(50, 10, 2);

        let out = market.tick(4_999.0, 4_999.0, &mut pool, &populations, &mut rng);
        assert!(out.consumption.is_empty());
        assert_eq!(market.good("ore").unwrap().history.len(), 1);

        let out = market.tick(10_000.0, 5_001.0, &mut pool, &populations, &mut rng);
        assert_eq!(out.consumption.len(), 1);
        // Two fluctuations elapsed, one price recompute
        assert_eq!(market.good("ore").unwrap().history.len(), 2);
    }

    #[test]
    fn test_zero_delta_tick_is_noop() {
        let mut market = make_market();
        let mut pool = make_pool();
        let mut rng = StdRng::seed_from_u64(3);
        market
            .add_local_event(LocalEvent::new("old", 0.0, 1.0))
            .unwrap();
        let out = market.tick(1e9, 0.0, &mut pool, &ClassTable::splat(10), &mut rng);
        assert!(out.expired_events.is_empty());
        assert_eq!(market.local_events().len(), 1);
        assert_eq!(pool.value("food"), 300.0);
    }
}
