//! Candidate confidence. Every signal is additive and non-negative, so a
//! weaker strategy can only lose through its lower base.

use crate::models::{Candidate, GameRules, StrategyKind};
use crate::scraper::cleaner::is_recent;
use chrono::NaiveDate;

// ── Weights ───────────────────────────────────────────────────────────────────

pub const BASE_LABELLED: u32 = 6;
pub const BASE_STRUCTURED: u32 = 6;
pub const BASE_STRUCTURAL: u32 = 5;
pub const BASE_DATE_ANCHORED: u32 = 5;
pub const BASE_FREE_TEXT: u32 = 1;

/// "winning", "result" or "draw" near the extraction site.
pub const KEYWORD: u32 = 2;
/// A date inside the horizon found next to the numbers.
pub const RECENT_DATE: u32 = 3;
/// Primaries neither clustered nor spanning the whole range.
pub const SPREAD: u32 = 2;
pub const COMPLETE_SECONDARY: u32 = 2;
/// First run of its table / block; only ever breaks ties.
pub const FIRST_IN_CONTAINER: u32 = 1;

const CONTEXT_KEYWORDS: &[&str] = &["winning", "result", "draw"];
const SPREAD_MIN: f64 = 0.30;
const SPREAD_MAX: f64 = 0.95;

pub fn base(kind: StrategyKind) -> u32 {
    match kind {
        StrategyKind::Labelled => BASE_LABELLED,
        StrategyKind::Structured => BASE_STRUCTURED,
        StrategyKind::Structural => BASE_STRUCTURAL,
        StrategyKind::DateAnchored => BASE_DATE_ANCHORED,
        StrategyKind::FreeText => BASE_FREE_TEXT,
    }
}

fn plausible_spread(primary: &[u32], rules: &GameRules) -> bool {
    let (Some(lo), Some(hi)) = (primary.iter().min(), primary.iter().max()) else {
        return false;
    };
    let width = f64::from(rules.max - rules.min);
    if width <= 0.0 {
        return false;
    }
    let ratio = f64::from(hi - lo) / width;
    (SPREAD_MIN..=SPREAD_MAX).contains(&ratio)
}

pub fn score(candidate: &Candidate, rules: &GameRules, today: NaiveDate, horizon_days: i64) -> u32 {
    let mut total = base(candidate.strategy);

    let context = candidate.context.to_lowercase();
    if CONTEXT_KEYWORDS.iter().any(|k| context.contains(k)) {
        total += KEYWORD;
    }
    if candidate.date_in_context && candidate.date.is_some_and(|d| is_recent(d, today, horizon_days)) {
        total += RECENT_DATE;
    }
    if plausible_spread(&candidate.primary, rules) {
        total += SPREAD;
    }
    if candidate.secondary.len() == rules.secondary_count {
        total += COMPLETE_SECONDARY;
    }
    if candidate.first_in_container {
        total += FIRST_IN_CONTAINER;
    }
    total
}

/// Score every candidate in place.
pub fn score_all(candidates: &mut [Candidate], rules: &GameRules, today: NaiveDate, horizon_days: i64) {
    for c in candidates.iter_mut() {
        c.confidence = score(c, rules, today, horizon_days);
    }
}
