// Player buy/sell against the market inventory

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::EconomyError;
use crate::resources::ResourcePool;
use crate::types::{Price, Quantity, ResourceId};

use super::TradeMarket;
use super::pricing::{floor_price, trade_nudge};

/// Structured result of a player trade. Failures carry the reason in
/// `message` and, for inventory shortfalls, what the market can offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct TradeOutcome {
    pub success: bool,
    pub resource: ResourceId,
    pub amount: Quantity,
    /// Gold the player pays on a buy
    pub cost: f64,
    /// Gold the player receives on a sell
    pub profit: f64,
    pub available_amount: Option<Quantity>,
    pub message: String,
}

impl TradeOutcome {
    fn failed(resource: &str, amount: Quantity, err: &EconomyError) -> Self {
        let available_amount = match err {
            EconomyError::InsufficientInventory { available, .. } => Some(*available),
            _ => None,
        };
        Self {
            success: false,
            resource: resource.to_string(),
            amount,
            cost: 0.0,
            profit: 0.0,
            available_amount,
            message: err.to_string(),
        }
    }
}

/// A committed trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeReceipt {
    pub amount: Quantity,
    pub unit_price: Price,
    pub total: f64,
}

impl TradeMarket {
    /// Buy from the market into the player's pool.
    ///
    /// Checks market inventory, then `gold`, then storage room. The caller
    /// owns the gold balance and deducts `total` on success.
    pub fn try_buy(
        &mut self,
        resource: &str,
        amount: Quantity,
        pool: &mut ResourcePool,
        gold: f64,
    ) -> Result<TradeReceipt, EconomyError> {
        if !(amount > 0.0 && amount.is_finite()) {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let good = self
            .goods
            .get_mut(resource)
            .ok_or_else(|| EconomyError::UnknownResource(resource.to_string()))?;
        if !pool.contains(resource) {
            return Err(EconomyError::UnknownResource(resource.to_string()));
        }
        if good.inventory < amount {
            return Err(EconomyError::InsufficientInventory {
                resource: resource.to_string(),
                requested: amount,
                available: good.inventory,
            });
        }
        let unit_price = good.current_price;
        let total = unit_price * amount;
        if gold < total {
            return Err(EconomyError::InsufficientFunds {
                cost: total,
                available: gold,
            });
        }
        let room = pool.headroom(resource);
        if room < amount {
            return Err(EconomyError::InsufficientStorage {
                resource: resource.to_string(),
                requested: amount,
                available: room,
            });
        }

        good.inventory -= amount;
        pool.put(resource, amount);
        let nudge = trade_nudge(amount, good.capacity);
        good.set_price(floor_price(unit_price * (1.0 + nudge)));

        Ok(TradeReceipt {
            amount,
            unit_price,
            total,
        })
    }

    /// Sell from the player's pool into the market at the sell spread.
    pub fn try_sell(
        &mut self,
        resource: &str,
        amount: Quantity,
        pool: &mut ResourcePool,
    ) -> Result<TradeReceipt, EconomyError> {
        if !(amount > 0.0 && amount.is_finite()) {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let spread = self.config.sell_spread;
        let good = self
            .goods
            .get_mut(resource)
            .ok_or_else(|| EconomyError::UnknownResource(resource.to_string()))?;
        let held = pool.value(resource);
        if held < amount {
            return Err(EconomyError::InsufficientResources {
                missing: [(resource.to_string(), amount - held)].into(),
            });
        }
        let room = good.room();
        if room < amount {
            return Err(EconomyError::InsufficientStorage {
                resource: resource.to_string(),
                requested: amount,
                available: room,
            });
        }

        let unit_price = good.current_price;
        let total = unit_price * amount * spread;
        pool.take(resource, amount);
        good.inventory += amount;
        let nudge = trade_nudge(amount, good.capacity);
        good.set_price(floor_price(unit_price * (1.0 - nudge)));

        Ok(TradeReceipt {
            amount,
            unit_price,
            total,
        })
    }

    pub fn player_buy_resource(
        &mut self,
        resource: &str,
        amount: Quantity,
        pool: &mut ResourcePool,
        gold: f64,
    ) -> TradeOutcome {
        match self.try_buy(resource, amount, pool, gold) {
            Ok(receipt) => {
                tracing::info!(
                    target: "trade",
                    side = "buy",
                    resource,
                    amount,
                    unit_price = receipt.unit_price,
                    total = receipt.total,
                );
                TradeOutcome {
                    success: true,
                    resource: resource.to_string(),
                    amount,
                    cost: receipt.total,
                    profit: 0.0,
                    available_amount: None,
                    message: format!("bought {amount} {resource} for {:.2} gold", receipt.total),
                }
            }
            Err(err) => {
                tracing::debug!(target: "trade", side = "buy", resource, error = %err, "trade rejected");
                TradeOutcome::failed(resource, amount, &err)
            }
        }
    }

    pub fn player_sell_resource(
        &mut self,
        resource: &str,
        amount: Quantity,
        pool: &mut ResourcePool,
    ) -> TradeOutcome {
        match self.try_sell(resource, amount, pool) {
            Ok(receipt) => {
                tracing::info!(
                    target: "trade",
                    side = "sell",
                    resource,
                    amount,
                    unit_price = receipt.unit_price,
                    total = receipt.total,
                );
                TradeOutcome {
                    success: true,
                    resource: resource.to_string(),
                    amount,
                    cost: 0.0,
                    profit: receipt.total,
                    available_amount: None,
                    message: format!("sold {amount} {resource} for {:.2} gold", receipt.total),
                }
            }
            Err(err) => {
                tracing::debug!(target: "trade", side = "sell", resource, error = %err, "trade rejected");
                TradeOutcome::failed(resource, amount, &err)
            }
        }
    }
}
