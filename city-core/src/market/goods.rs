// Priced goods and services with bounded price history

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Price, Quantity, ResourceId, ServiceId};

pub const MIN_PRICE: Price = 1.0;

fn default_volatility() -> f64 {
    0.1
}

fn default_capacity() -> Quantity {
    500.0
}

/// Fixed-length price samples, oldest first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    samples: VecDeque<Price>,
    limit: usize,
}

impl PriceHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, price: Price) {
        if self.limit == 0 {
            return;
        }
        while self.samples.len() >= self.limit {
            self.samples.pop_front();
        }
        self.samples.push_back(price);
    }

    pub fn latest(&self) -> Option<Price> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Price> {
        self.samples.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodDef {
    pub id: ResourceId,
    pub base_price: Price,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default = "default_capacity")]
    pub capacity: Quantity,
    /// Market stock at start, half capacity when omitted
    #[serde(default)]
    pub initial_inventory: Option<Quantity>,
}

impl GoodDef {
    pub fn new(id: impl Into<ResourceId>, base_price: Price) -> Self {
        Self {
            id: id.into(),
            base_price,
            volatility: default_volatility(),
            capacity: default_capacity(),
            initial_inventory: None,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_capacity(mut self, capacity: Quantity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_inventory(mut self, inventory: Quantity) -> Self {
        self.initial_inventory = Some(inventory);
        self
    }
}

/// A tradeable good. The market's own inventory is separate from the
/// player's stock in the resource pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedGood {
    pub id: ResourceId,
    pub base_price: Price,
    pub current_price: Price,
    pub volatility: f64,
    /// Combined supply ratio from the last fluctuation
    pub supply: f64,
    pub inventory: Quantity,
    pub capacity: Quantity,
    pub history: PriceHistory,
}

impl PricedGood {
    pub fn new(def: &GoodDef, history_len: usize) -> Self {
        let capacity = def.capacity.max(0.0);
        let inventory = def.initial_inventory.unwrap_or(capacity / 2.0).clamp(0.0, capacity);
        let mut history = PriceHistory::new(history_len);
        let current_price = def.base_price.max(MIN_PRICE);
        history.push(current_price);
        Self {
            id: def.id.clone(),
            base_price: def.base_price,
            current_price,
            volatility: def.volatility,
            supply: 0.5,
            inventory,
            capacity,
            history,
        }
    }

    pub fn inventory_ratio(&self) -> f64 {
        if self.capacity <= 0.0 {
            return 0.0;
        }
        (self.inventory / self.capacity).clamp(0.0, 1.0)
    }

    pub fn room(&self) -> Quantity {
        (self.capacity - self.inventory).max(0.0)
    }

    pub fn set_price(&mut self, price: Price) {
        self.current_price = price.max(MIN_PRICE);
    }

    /// Move inventory a fraction of the way back toward half capacity.
    pub fn restock(&mut self, fraction: f64) {
        let target = self.capacity / 2.0;
        self.inventory += (target - self.inventory) * fraction.clamp(0.0, 1.0);
        self.inventory = self.inventory.clamp(0.0, self.capacity);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub id: ServiceId,
    pub base_price: Price,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

impl ServiceDef {
    pub fn new(id: impl Into<ServiceId>, base_price: Price) -> Self {
        Self {
            id: id.into(),
            base_price,
            volatility: default_volatility(),
        }
    }
}

/// A non-stockable service priced off inflation
#[derive(Debug, Clone, PartialEq)]
pub struct PricedService {
    pub id: ServiceId,
    pub base_price: Price,
    pub current_price: Price,
    pub volatility: f64,
    pub history: PriceHistory,
}

impl PricedService {
    pub fn new(def: &ServiceDef, history_len: usize) -> Self {
        let current_price = def.base_price.max(MIN_PRICE);
        let mut history = PriceHistory::new(history_len);
        history.push(current_price);
        Self {
            id: def.id.clone(),
            base_price: def.base_price,
            current_price,
            volatility: def.volatility,
            history,
        }
    }
}

pub fn default_good_defs() -> Vec<GoodDef> {
    vec![
        GoodDef::new("wood", 5.0),
        GoodDef::new("stone", 6.0),
        GoodDef::new("ore", 8.0),
        GoodDef::new("food", 4.0),
        GoodDef::new("water", 2.0),
        GoodDef::new("planks", 12.0),
        GoodDef::new("metal", 20.0),
        GoodDef::new("bread", 10.0),
        GoodDef::new("tools", 40.0).with_volatility(0.15),
        GoodDef::new("essence", 60.0)
            .with_volatility(0.2)
            .with_capacity(200.0),
        GoodDef::new("jewelry", 120.0)
            .with_volatility(0.25)
            .with_capacity(50.0),
    ]
}

pub fn default_service_defs() -> Vec<ServiceDef> {
    vec![
        ServiceDef::new("healthcare", 30.0),
        ServiceDef::new("education", 25.0),
        ServiceDef::new("entertainment", 15.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = PriceHistory::new(3);
        for p in [1.0, 2.0, 3.0, 4.0] {
            history.push(p);
        }
        assert_eq!(history.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(history.latest(), Some(4.0));
    }

    #[test]
    fn test_new_good_starts_half_full() {
        let good = PricedGood::new(&GoodDef::new("ore", 8.0), 32);
        assert_eq!(good.inventory, 250.0);
        assert_eq!(good.room(), 250.0);
        assert_eq!(good.current_price, 8.0);
    }

    #[test]
    fn test_price_never_below_floor() {
        let mut good = PricedGood::new(&GoodDef::new("water", 0.2), 4);
        assert_eq!(good.current_price, MIN_PRICE);
        good.set_price(-3.0);
        assert_eq!(good.current_price, MIN_PRICE);
    }

    #[test]
    fn test_restock_moves_toward_half() {
        let mut good = PricedGood::new(&GoodDef::new("ore", 8.0).with_inventory(0.0), 4);
        good.restock(0.1);
        assert!((good.inventory - 25.0).abs() < 1e-9);
    }
}
