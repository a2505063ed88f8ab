//! Independent extraction heuristics over one fetched page.
//!
//! Every strategy is a pure function of the page and [`ParseContext`]: no I/O,
//! no randomness, no panics on malformed markup. A miss is an empty vector.

pub mod date_anchored;
pub mod free_text;
pub mod labelled;
pub mod structural;
pub mod structured;

use crate::models::{Candidate, GameRules, StrategyKind};
use crate::scraper::cleaner::{find_dates, is_recent, visible_text};
use chrono::NaiveDate;
use scraper::Html;

pub use self::date_anchored::DateAnchored;
pub use self::free_text::FreeText;
pub use self::labelled::Labelled;
pub use self::structural::Structural;
pub use self::structured::StructuredData;

/// Longest context snippet kept on a candidate.
pub const CONTEXT_LIMIT: usize = 400;

pub struct ParseContext<'a> {
    pub rules: &'a GameRules,
    pub today: NaiveDate,
    pub horizon_days: i64,
    pub window_chars: usize,
}

impl ParseContext<'_> {
    pub fn is_recent(&self, date: NaiveDate) -> bool {
        is_recent(date, self.today, self.horizon_days)
    }

    /// Most recent in-horizon date mentioned in `text`.
    pub fn recent_date_in(&self, text: &str) -> Option<NaiveDate> {
        find_dates(text)
            .into_iter()
            .map(|m| m.date)
            .filter(|d| self.is_recent(*d))
            .max()
    }
}

/// One fetched page, parsed once and shared by every strategy.
pub struct Page {
    pub html: String,
    pub doc: Html,
    pub text: String,
}

impl Page {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            doc: Html::parse_document(html),
            text: visible_text(html),
        }
    }
}

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate>;
}

/// All strategies in their fixed application order.
pub fn default_set() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(Labelled),
        Box::new(Structural),
        Box::new(DateAnchored),
        Box::new(StructuredData),
        Box::new(FreeText),
    ]
}

/// Run every strategy over one page, concatenating results in strategy order.
pub fn run_all(strategies: &[Box<dyn Strategy>], page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
    strategies
        .iter()
        .flat_map(|s| {
            let found = s.parse(page, ctx);
            tracing::debug!("{}: {} candidate(s)", s.kind(), found.len());
            found
        })
        .collect()
}

/// Truncate to at most `CONTEXT_LIMIT` bytes on a char boundary.
pub fn snippet(text: &str) -> String {
    if text.len() <= CONTEXT_LIMIT {
        return text.to_string();
    }
    let mut end = CONTEXT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Byte slice `text[start..end]` with both ends pulled onto char boundaries.
pub fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    let mut s = start.min(text.len());
    while !text.is_char_boundary(s) {
        s -= 1;
    }
    let mut e = end.min(text.len()).max(s);
    while !text.is_char_boundary(e) {
        e += 1;
    }
    &text[s..e]
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_every_strategy_handles_garbage() {
        let rules = GameRules::toto();
        let ctx = ctx(&rules);
        for input in ["", "<<<>>>", "<table><tr><td>", "{\"drawDate\": ", "1 2 3"] {
            let page = Page::new(input);
            assert!(run_all(&default_set(), &page, &ctx).is_empty(), "input {:?}", input);
        }
    }

    #[test]
    fn test_strategies_are_deterministic() {
        let rules = GameRules::toto();
        let ctx = ctx(&rules);
        let page = Page::new(RESULTS_PAGE);
        let a = run_all(&default_set(), &page, &ctx);
        let b = run_all(&default_set(), &page, &ctx);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_slice_chars_respects_boundaries() {
        let s = "ab€cd";
        assert_eq!(slice_chars(s, 3, 4), "€");
        assert_eq!(slice_chars(s, 0, 100), s);
    }
}
