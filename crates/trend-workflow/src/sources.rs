//! Trend source implementations
//!
//! The live market feed is out of scope; these sources stand in for it.
//! `SimulatedSource` derives plausible, fully deterministic trends from the
//! symbol itself, and `ScriptedSource` replays a fixed outcome sequence so
//! tests control failure/success ordering exactly.

use crate::invoker::{SourceError, TrendSource};
use async_trait::async_trait;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};
use trend_core::{Importance, Symbol, Trend, TrendSet};

/// Deterministic stand-in for the live market data call
///
/// Derives a price move, volume activity, and volatility figure from the
/// symbol bytes, so repeated fetches for the same symbol always return the
/// same three trends. Never fails and never touches the network.
pub struct SimulatedSource;

impl SimulatedSource {
    pub fn new() -> Self {
        Self
    }

    fn seed(symbol: &Symbol) -> u32 {
        symbol.as_str().bytes().map(u32::from).sum()
    }

    fn importance_for_move(pct: f64) -> Importance {
        if pct.abs() > 7.0 {
            Importance::High
        } else if pct.abs() > 3.0 {
            Importance::Moderate
        } else {
            Importance::Low
        }
    }

    fn importance_for_volatility(pct: f64) -> Importance {
        if pct > 35.0 {
            Importance::High
        } else if pct > 25.0 {
            Importance::Moderate
        } else {
            Importance::Low
        }
    }

    fn build_trends(symbol: &Symbol) -> Result<TrendSet, SourceError> {
        let seed = Self::seed(symbol);
        let price_move = f64::from(seed % 21) - 10.0; // percent over 30 days
        let volume_delta = f64::from(seed % 7) * 12.5 - 25.0; // percent vs average
        let volatility = 15.0 + f64::from(seed % 30); // annualized percent
        let confidence = 0.6 + f64::from(seed % 4) * 0.1;

        let direction = if price_move >= 0.0 { "gained" } else { "lost" };
        let interest = if volume_delta >= 0.0 {
            "heightened"
        } else {
            "reduced"
        };

        let trends = vec![
            Trend::new(
                format!("30-day price move: {price_move:+.1}%"),
                Self::importance_for_move(price_move),
                format!(
                    "{} {} {:.1}% over the last month, pointing to {} pressure.",
                    symbol,
                    direction,
                    price_move.abs(),
                    if price_move >= 0.0 { "buying" } else { "selling" }
                ),
                confidence,
            ),
            Trend::new(
                format!("Volume activity: {volume_delta:+.1}% vs average"),
                if volume_delta.abs() > 30.0 {
                    Importance::Moderate
                } else {
                    Importance::Low
                },
                format!(
                    "Recent volume suggests {interest} interest in {symbol}."
                ),
                confidence,
            ),
            Trend::new(
                format!("Annualized volatility: {volatility:.1}%"),
                Self::importance_for_volatility(volatility),
                format!(
                    "Volatility of {volatility:.1}% indicates {} risk for holders.",
                    if volatility > 30.0 { "elevated" } else { "moderate" }
                ),
                confidence,
            ),
        ];

        TrendSet::new(trends).map_err(|e| SourceError::no_data(e.to_string()))
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrendSource for SimulatedSource {
    async fn fetch(&self, symbol: &Symbol) -> Result<TrendSet, SourceError> {
        Self::build_trends(symbol)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// One step of a scripted fetch sequence
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum ScriptedCall {
    Succeed(TrendSet),
    Fail(SourceError),
}

/// Replays a fixed sequence of outcomes, then fails every further call
///
/// The deterministic fault source used by tests: an empty script is an
/// always-failing source. Only compiled into test builds.
#[cfg(test)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: AtomicU32,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(script: Vec<ScriptedCall>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of fetch calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl TrendSource for ScriptedSource {
    async fn fetch(&self, _symbol: &Symbol) -> Result<TrendSet, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match next {
            Some(ScriptedCall::Succeed(trends)) => Ok(trends),
            Some(ScriptedCall::Fail(error)) => Err(error),
            None => Err(SourceError::connectivity("no scripted outcome remaining")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
