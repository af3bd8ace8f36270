#![deny(warnings)]

//! Economic models for the galaxy trade simulation: the price function,
//! the production/consumption saturation model, and the pairwise
//! trade-equilibrium solve applied along jump routes.
//!
//! Everything in this crate is a pure function of its inputs; the
//! mutable per-system state lives in `galaxy-sim`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credits every system starts with.
pub const STARTING_CREDITS: f64 = 100_000_000.0;
/// Stockpile of every simulated good a system starts with.
pub const STARTING_GOODS: f64 = 100_000.0;
/// How much of the trade that wants to happen actually clears per tick.
pub const DEFAULT_TRADE_MODIFIER: f64 = 0.99;
/// Galaxy-wide production scaling.
pub const DEFAULT_PRODUCTION_MODIFIER: f64 = 0.1;
/// Stockpiles are never allowed at or below this level; trades and
/// production deltas that would cross it are skipped or clamped.
pub const STOCKPILE_FLOOR: f64 = 1e-3;

/// Scarcity scale for net producers: restocking speeds up as the
/// stockpile shrinks below this many units.
const RESTOCK_SCALE: f64 = 180_000.0;
/// Abundance scale for net consumers: consumption is proportional to
/// stockpile over this constant, so it decays instead of overshooting.
const CONSUMPTION_SCALE: f64 = 18_000.0;

/// Raw price factor of a system at starting conditions. Dividing by
/// this normalizes displayed prices so a balanced system prices each
/// good at exactly its base price.
const PRICE_NORM: f64 = STARTING_CREDITS / STARTING_GOODS;

/// Errors produced when validating economic tuning.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// The trade modifier must lie strictly between 0 and 1.
    #[error("trade modifier {0} outside (0, 1)")]
    InvalidTradeModifier(f64),
    /// The production modifier must be finite and non-negative.
    #[error("invalid production modifier: {0}")]
    InvalidProductionModifier(f64),
}

/// Galaxy-wide tuning knobs for the simulation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EconConfig {
    /// Fraction of the single-step equilibrium trade that clears per
    /// tick; must be in (0, 1). Higher means faster price convergence.
    pub trade_modifier: f64,
    /// Uniform scale on all production/consumption, for galaxy-wide
    /// tuning without touching per-planet data.
    pub production_modifier: f64,
}

impl Default for EconConfig {
    fn default() -> Self {
        Self {
            trade_modifier: DEFAULT_TRADE_MODIFIER,
            production_modifier: DEFAULT_PRODUCTION_MODIFIER,
        }
    }
}

impl EconConfig {
    /// Validate tuning ranges.
    pub fn validate(&self) -> Result<(), EconError> {
        if !self.trade_modifier.is_finite()
            || self.trade_modifier <= 0.0
            || self.trade_modifier >= 1.0
        {
            return Err(EconError::InvalidTradeModifier(self.trade_modifier));
        }
        if !self.production_modifier.is_finite() || self.production_modifier < 0.0 {
            return Err(EconError::InvalidProductionModifier(
                self.production_modifier,
            ));
        }
        Ok(())
    }
}

/// Raw unit price factor of a good in a system.
///
/// Strictly increasing in credits (more local wealth, pricier) and
/// strictly decreasing in stockpile (more supply, cheaper). Callers
/// must uphold `stockpile > 0`.
pub fn price_factor(credits: f64, stockpile: f64) -> f64 {
    credits / stockpile
}

/// Displayed unit price of a good, in credits.
///
/// A system at starting conditions prices the good at exactly
/// `base_price`; wealth and scarcity scale it from there.
pub fn unit_price(base_price: f64, credits: f64, stockpile: f64) -> f64 {
    base_price * price_factor(credits, stockpile) / PRICE_NORM
}

/// Stockpile delta from one tick of production or consumption.
///
/// Net producers (`modifier >= 0`) restock inversely to what is on
/// hand, so scarcity accelerates resupply and glut chokes it off. Net
/// consumers draw down proportionally to the stockpile, so consumption
/// decays toward zero instead of driving the stockpile negative.
pub fn production_delta(production_modifier: f64, modifier: f64, stockpile: f64) -> f64 {
    if modifier >= 0.0 {
        production_modifier * modifier * (RESTOCK_SCALE / stockpile)
    } else {
        production_modifier * modifier * (stockpile / CONSUMPTION_SCALE)
    }
}

/// One tick's exchange along a single jump edge for a single good.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TradeFlow {
    /// Goods received by side A (negative: A ships to B).
    pub quantity: f64,
    /// Joint reference price both sides trade at.
    pub unit_price: f64,
}

/// Solves the damped pairwise trade equilibrium for one good.
///
/// Both systems trade at the joint price
/// `(credits_a + credits_b) / (stock_a + stock_b)`. The undamped
/// quantity is the exact single-point solution that equalizes the two
/// local price factors; `trade_modifier` in (0, 1) scales it down so
/// each tick only closes part of the gap. Positive quantity flows
/// into A.
///
/// Returns `None` when the combined stockpile is at the floor, when
/// the arithmetic degenerates to a non-finite value, or when applying
/// the trade would push either stockpile to the floor — all treated as
/// no-trade for this edge and good this tick.
pub fn trade_flow(
    trade_modifier: f64,
    credits_a: f64,
    stock_a: f64,
    credits_b: f64,
    stock_b: f64,
) -> Option<TradeFlow> {
    let combined = stock_a + stock_b;
    if combined <= STOCKPILE_FLOOR {
        return None;
    }
    let joint = (credits_a + credits_b) / combined;
    let quantity = trade_modifier * (credits_a * stock_b - credits_b * stock_a)
        / (joint * combined + credits_a + credits_b);
    if !joint.is_finite() || !quantity.is_finite() {
        return None;
    }
    // Cannot happen while both currencies stay positive, but deficits
    // are allowed, so the degenerate case is reachable.
    if stock_a + quantity <= STOCKPILE_FLOOR || stock_b - quantity <= STOCKPILE_FLOOR {
        return None;
    }
    Some(TradeFlow {
        quantity,
        unit_price: joint,
    })
}

/// Cost in credits of buying `quantity` units from a system with
/// finite funds, walking the price function one unit at a time so each
/// unit is dearer than the last. Negative quantity is a sale to the
/// system and yields the (negative) payout.
///
/// Returns `None` when the purchase would drain the stockpile to one
/// unit or less.
pub fn cost_of_purchase(
    base_price: f64,
    credits: f64,
    stockpile: f64,
    quantity: i64,
) -> Option<i64> {
    if stockpile - quantity as f64 <= 1.0 {
        return None;
    }
    let step = if quantity > 0 { 1i64 } else { -1i64 };
    let mut credits = credits;
    let mut stockpile = stockpile;
    let mut total = 0.0;
    let mut traded = 0i64;
    while traded != quantity {
        let price = price_factor(credits, stockpile);
        credits += price * step as f64;
        stockpile -= step as f64;
        total += price * step as f64;
        traded += step;
    }
    Some((total * base_price / PRICE_NORM) as i64)
}
