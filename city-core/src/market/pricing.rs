// Price formation: supply-driven goods prices, inflation and local events

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Millis, Price};

use super::goods::{MIN_PRICE, PriceHistory};

/// Weight of market-side inventory in the combined supply ratio
pub const MARKET_SUPPLY_WEIGHT: f64 = 0.7;
pub const PLAYER_SUPPLY_WEIGHT: f64 = 0.3;
pub const INFLATION_MEMORY: f64 = 0.8;
/// Largest immediate price move from a single trade
pub const TRADE_NUDGE: f64 = 0.2;

pub fn combined_supply(market_ratio: f64, player_ratio: f64) -> f64 {
    (MARKET_SUPPLY_WEIGHT * market_ratio + PLAYER_SUPPLY_WEIGHT * player_ratio).clamp(0.0, 1.0)
}

/// Scarce goods cost up to 2x base, plentiful ones down to half.
pub fn supply_price(base_price: Price, supply: f64) -> Price {
    base_price * (0.5 + (1.0 - supply) * 1.5)
}

/// Multiplicative noise uniform in `[1 - volatility, 1 + volatility]`
pub fn noise(rng: &mut impl Rng, volatility: f64) -> f64 {
    if volatility <= 0.0 {
        return 1.0;
    }
    1.0 + rng.random_range(-volatility..=volatility)
}

/// Fraction a trade of `amount` moves the price: `0.2 * min(1, amount / capacity)`
pub fn trade_nudge(amount: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return TRADE_NUDGE;
    }
    TRADE_NUDGE * (amount / capacity).clamp(0.0, 1.0)
}

pub fn floor_price(price: Price) -> Price {
    if price.is_finite() {
        price.max(MIN_PRICE)
    } else {
        MIN_PRICE
    }
}

// ============================================================================
// Local Events
// ============================================================================

/// Time-boxed price modifiers. Inert before `start_time`, purged once
/// `now > start_time + duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEvent {
    pub id: String,
    pub start_time: Millis,
    pub duration: Millis,
    /// Good or service id to multiplier
    pub price_modifiers: BTreeMap<String, f64>,
}

impl LocalEvent {
    pub fn new(id: impl Into<String>, start_time: Millis, duration: Millis) -> Self {
        Self {
            id: id.into(),
            start_time,
            duration,
            price_modifiers: BTreeMap::new(),
        }
    }

    pub fn with_modifier(mut self, target: impl Into<String>, multiplier: f64) -> Self {
        self.price_modifiers.insert(target.into(), multiplier);
        self
    }

    pub fn end_time(&self) -> Millis {
        self.start_time + self.duration
    }

    pub fn is_active(&self, now: Millis) -> bool {
        self.start_time <= now && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now > self.end_time()
    }
}

/// Product of every active modifier on `target`
pub fn event_multiplier(events: &[LocalEvent], target: &str, now: Millis) -> f64 {
    events
        .iter()
        .filter(|e| e.is_active(now))
        .filter_map(|e| e.price_modifiers.get(target))
        .product()
}

// ============================================================================
// Inflation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflationState {
    pub rate: f64,
    pub history: PriceHistory,
}

impl InflationState {
    pub fn new(history_len: usize) -> Self {
        let mut history = PriceHistory::new(history_len);
        history.push(1.0);
        Self { rate: 1.0, history }
    }

    /// Smooth the average price ratio into the rate.
    pub fn observe(&mut self, ratios: impl IntoIterator<Item = f64>) {
        let (sum, n) = ratios
            .into_iter()
            .filter(|r| r.is_finite())
            .fold((0.0, 0usize), |(s, n), r| (s + r, n + 1));
        if n == 0 {
            return;
        }
        let average = sum / n as f64;
        self.rate = INFLATION_MEMORY * self.rate + (1.0 - INFLATION_MEMORY) * average;
        self.history.push(self.rate);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_supply_price_curve() {
        assert_eq!(supply_price(10.0, 1.0), 5.0);
        assert_eq!(supply_price(10.0, 0.0), 20.0);
        assert_eq!(supply_price(10.0, 0.5), 12.5);
    }

    #[test]
    fn test_combined_supply_weights() {
        assert!((combined_supply(1.0, 0.0) - 0.7).abs() < 1e-9);
        assert!((combined_supply(0.0, 1.0) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_noise_within_volatility() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let n = noise(&mut rng, 0.1);
            assert!((0.9..=1.1).contains(&n));
        }
        assert_eq!(noise(&mut rng, 0.0), 1.0);
    }

    #[test]
    fn test_trade_nudge_saturates() {
        assert!((trade_nudge(50.0, 500.0) - 0.02).abs() < 1e-9);
        assert_eq!(trade_nudge(5000.0, 500.0), TRADE_NUDGE);
    }

    #[test]
    fn test_overlapping_events_compound() {
        let events = vec![
            LocalEvent::new("drought", 0.0, 10_000.0).with_modifier("food", 1.5),
            LocalEvent::new("festival", 2_000.0, 5_000.0).with_modifier("food", 1.2),
        ];
        assert!((event_multiplier(&events, "food", 1_000.0) - 1.5).abs() < 1e-9);
        assert!((event_multiplier(&events, "food", 3_000.0) - 1.8).abs() < 1e-9);
        assert_eq!(event_multiplier(&events, "ore", 3_000.0), 1.0);
        // Hard cliff after expiry
        assert_eq!(event_multiplier(&events, "food", 10_001.0), 1.0);
    }

    #[test]
    fn test_event_window_edges() {
        let event = LocalEvent::new("fair", 100.0, 50.0);
        assert!(!event.is_active(99.0));
        assert!(event.is_active(150.0));
        assert!(!event.is_expired(150.0));
        assert!(event.is_expired(150.5));
    }

    #[test]
    fn test_inflation_smoothing() {
        let mut inflation = InflationState::new(8);
        inflation.observe([2.0, 2.0]);
        assert!((inflation.rate - 1.2).abs() < 1e-9);
        inflation.observe(std::iter::empty());
        assert!((inflation.rate - 1.2).abs() < 1e-9);
        assert_eq!(inflation.history.len(), 2);
    }
}
