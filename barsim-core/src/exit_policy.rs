//! Exit policy engine — per-position state machine for automatic exits.
//!
//! Each open position is tracked as `Locked` (holding period still running),
//! `Free` (holding period elapsed) or `Closed` (an exit has been issued).
//! Triggers are checked once per market event in priority order, first match
//! wins:
//!
//! 1. catastrophic stop (fires even while locked)
//! 2. stop-loss (fires even while locked)
//! 3. trailing stop, once armed (fires even while locked)
//! 4. take-profit (free only)
//! 5. technical reversal from the strategy (free only)

use crate::config::ExitRules;
use crate::domain::{ExitReason, Position, PositionSide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    Locked,
    Free,
    Closed,
}

impl ExitState {
    fn for_bars_held(bars_held: usize, min_holding_period: usize) -> Self {
        if bars_held < min_holding_period {
            Self::Locked
        } else {
            Self::Free
        }
    }
}

/// Whether the trailing stop is armed: the best return since entry exceeded
/// the activation threshold. A position that never gained is never armed.
pub fn trailing_armed(rules: &ExitRules, position: &Position) -> bool {
    rules.trailing_stop_pct.is_some()
        && position.best_return_pct() > rules.trailing_activation_pct
}

/// Whether the last mark has retraced `trail_pct` from the best price.
fn trailing_hit(position: &Position, trail_pct: f64) -> bool {
    match position.side() {
        PositionSide::Long => position.mark_price <= position.peak_price * (1.0 - trail_pct),
        PositionSide::Short => position.mark_price >= position.trough_price * (1.0 + trail_pct),
        PositionSide::Flat => false,
    }
}

/// Pure trigger check for one position in a given state.
pub fn decide(
    rules: &ExitRules,
    position: &Position,
    state: ExitState,
    technical_reversal: bool,
) -> Option<ExitReason> {
    if state == ExitState::Closed || position.is_flat() {
        return None;
    }
    let pct = position.unrealized_pct();

    if rules.catastrophic_stop_pct.is_some_and(|cat| pct <= -cat) {
        return Some(ExitReason::CatastrophicStop);
    }
    if rules.stop_loss_pct.is_some_and(|stop| pct <= -stop) {
        return Some(ExitReason::StopLoss);
    }
    if let Some(trail) = rules.trailing_stop_pct {
        if trailing_armed(rules, position) && trailing_hit(position, trail) {
            return Some(ExitReason::TrailingStop);
        }
    }

    if state == ExitState::Locked {
        return None;
    }
    if rules.take_profit_pct.is_some_and(|tp| pct >= tp) {
        return Some(ExitReason::TakeProfit);
    }
    if technical_reversal {
        return Some(ExitReason::TechnicalReversal);
    }
    None
}

/// Tracks exit state for every open position.
#[derive(Debug, Clone)]
pub struct ExitPolicyEngine {
    rules: ExitRules,
    states: BTreeMap<String, ExitState>,
}

impl ExitPolicyEngine {
    pub fn new(rules: ExitRules) -> Self {
        Self {
            rules,
            states: BTreeMap::new(),
        }
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    pub fn state(&self, symbol: &str) -> Option<ExitState> {
        self.states.get(symbol).copied()
    }

    /// Evaluate one open position after it has been marked for this bar.
    ///
    /// On a trigger the tracker moves to `Closed` and the reason is returned;
    /// the caller turns it into a synthetic exit signal.
    pub fn evaluate(&mut self, position: &Position, technical_reversal: bool) -> Option<ExitReason> {
        let min_hold = self.rules.min_holding_period_bars;
        let state = self
            .states
            .entry(position.symbol.clone())
            .or_insert(ExitState::Locked);
        if *state != ExitState::Closed {
            *state = ExitState::for_bars_held(position.bars_held, min_hold);
        }

        let reason = decide(&self.rules, position, *state, technical_reversal)?;
        *state = ExitState::Closed;
        info!(
            symbol = %position.symbol,
            %reason,
            bars_held = position.bars_held,
            unrealized_pct = position.unrealized_pct(),
            "exit triggered"
        );
        Some(reason)
    }

    /// The exit could not be placed; resume tracking on the next bar.
    pub fn reopen(&mut self, position: &Position) {
        if let Some(state) = self.states.get_mut(&position.symbol) {
            *state = ExitState::for_bars_held(position.bars_held, self.rules.min_holding_period_bars);
        }
    }

    /// The position is gone; forget it.
    pub fn on_position_closed(&mut self, symbol: &str) {
        self.states.remove(symbol);
    }

    /// Symbols currently tracked, in sorted order.
    pub fn tracked(&self) -> impl Iterator<Item = (&str, ExitState)> {
        self.states.iter().map(|(s, st)| (s.as_str(), *st))
    }
}
