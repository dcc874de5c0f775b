//! Non-big-win streak evaluation.
//!
//! A pass walks the draw history oldest-first, counting consecutive draws
//! that are not a "big win". When the newest draw leaves the count two or
//! three short of a rule's threshold, the rule raises an [`Alert`] carrying
//! the trace of the current run.
//!
//! History must be sorted ascending by `(date, id)`; the dataset store
//! guarantees that order, callers building history by hand must sort it.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use tracing::debug;

use crate::draw::DrawRecord;
use crate::rules::RuleConfig;

/// Result sums that count as a big win unless configured otherwise.
pub const DEFAULT_BIG_WIN_SUMS: [u32; 4] = [4, 5, 16, 17];

/// A rule is near triggering once `streak + NEAR_MARGIN >= threshold`.
const NEAR_MARGIN: u32 = 3;

/// Decides which draws reset a streak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigWinRule {
    sums: BTreeSet<u32>,
}

impl BigWinRule {
    pub fn new(sums: impl IntoIterator<Item = u32>) -> Self {
        Self {
            sums: sums.into_iter().collect(),
        }
    }

    /// Sum in the big-win set, or a three-of-a-kind on a 3-number draw.
    pub fn is_big_win(&self, draw: &DrawRecord) -> bool {
        self.sums.contains(&draw.sum()) || is_triple(&draw.result)
    }
}

impl Default for BigWinRule {
    fn default() -> Self {
        Self::new(DEFAULT_BIG_WIN_SUMS)
    }
}

fn is_triple(result: &[u32]) -> bool {
    matches!(result, [a, b, c] if a == b && b == c)
}

/// A rule that fired on the newest draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub threshold: u32,
    pub recommended_number: String,
    pub streak: u32,
    /// One line per non-big-win draw of the current run.
    pub trace: String,
}

impl Alert {
    pub fn subject(&self, game: &str) -> String {
        format!(
            "[{game}] streak {}/{}: pick {}",
            self.streak, self.threshold, self.recommended_number
        )
    }

    pub fn body(&self) -> String {
        format!(
            "Threshold (SoTour): {}\nRecommended number (SoMuonDanh): {}\nCurrent streak: {}\n\n{}",
            self.threshold, self.recommended_number, self.streak, self.trace
        )
    }
}

/// Outcome of one rule pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub rule: RuleConfig,
    /// Streak after the newest draw.
    pub final_streak: u32,
    pub alert: Option<Alert>,
}

#[derive(Default)]
struct StreakState {
    current: u32,
    trace: String,
}

impl StreakState {
    fn reset(&mut self) {
        self.current = 0;
        self.trace.clear();
    }

    fn advance(&mut self, draw: &DrawRecord) {
        self.current += 1;
        let _ = writeln!(
            self.trace,
            "{} #{} {:?} sum={} streak={}",
            draw.date,
            draw.id,
            draw.result,
            draw.sum(),
            self.current
        );
    }
}

/// Run one rule over `history`.
pub fn evaluate_rule(history: &[DrawRecord], rule: &RuleConfig, big_win: &BigWinRule) -> Evaluation {
    let threshold = rule.streak_threshold;
    let mut state = StreakState::default();
    let mut alert = None;

    for (idx, draw) in history.iter().enumerate() {
        let is_last = idx + 1 == history.len();

        if big_win.is_big_win(draw) {
            state.reset();
        } else {
            state.advance(draw);
        }

        if state.current.saturating_add(NEAR_MARGIN) < threshold {
            continue;
        }
        if !is_last {
            // A near-trigger that is not on the newest draw is stale.
            state.trace.clear();
            continue;
        }
        let fires = state.current.saturating_add(NEAR_MARGIN) == threshold
            || state.current.saturating_add(NEAR_MARGIN - 1) == threshold;
        if fires {
            debug!(
                threshold,
                streak = state.current,
                pick = %rule.recommended_number,
                "streak rule fired"
            );
            alert = Some(Alert {
                threshold,
                recommended_number: rule.recommended_number.clone(),
                streak: state.current,
                trace: state.trace.clone(),
            });
        }
    }

    Evaluation {
        rule: rule.clone(),
        final_streak: state.current,
        alert,
    }
}

/// Run every rule independently over the same history.
pub fn evaluate_rules(
    history: &[DrawRecord],
    rules: &[RuleConfig],
    big_win: &BigWinRule,
) -> Vec<Evaluation> {
    rules
        .iter()
        .map(|rule| evaluate_rule(history, rule, big_win))
        .collect()
}
