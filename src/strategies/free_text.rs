use super::{slice_chars, snippet, Page, ParseContext, Strategy};
use crate::models::{Candidate, StrategyKind};
use crate::scraper::cleaner::{find_draw_number, find_runs, tokens};

/// Upper bound on runs taken from one page; long number lists are tables the
/// other strategies handle better.
const MAX_RUNS: usize = 20;

/// Last resort: any `pick + secondary_count` consecutive integers in the
/// visible text. A word or an out-of-range integer breaks the sequence.
pub struct FreeText;

impl Strategy for FreeText {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FreeText
    }

    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
        let rules = ctx.rules;
        let text = page.text.as_str();
        let toks = tokens(text);
        let values: Vec<Option<u32>> = toks.iter().map(|t| t.value).collect();
        let len = rules.run_len();
        let page_date = ctx.recent_date_in(text);

        find_runs(&values, rules, len)
            .into_iter()
            .take(MAX_RUNS)
            .enumerate()
            .map(|(idx, (start, values))| {
                let span_start = toks[start].start;
                let span_end = toks[start + len - 1].end;
                let before = slice_chars(text, span_start.saturating_sub(ctx.window_chars / 2), span_start);
                let around = slice_chars(text, span_start.saturating_sub(ctx.window_chars / 2), span_end);

                let (primary, secondary) = values.split_at(rules.pick);
                let mut cand = Candidate::new(StrategyKind::FreeText, primary.to_vec(), secondary.to_vec());
                let local_date = ctx.recent_date_in(before);
                cand.date = local_date.or(page_date);
                cand.date_in_context = local_date.is_some();
                cand.draw_number = find_draw_number(before);
                cand.context = snippet(around);
                cand.first_in_container = idx == 0;
                cand
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::GameRules;

    #[test]
    fn test_plain_sequence() {
        let html = "<p>Latest draw Thu, 04 Dec 2025 : 6 11 20 28 33 43 16</p>";
        let rules = GameRules::toto();
        let found = FreeText.parse(&Page::new(html), &ctx(&rules));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].primary, vec![6, 11, 20, 28, 33, 43]);
        assert_eq!(found[0].secondary, vec![16]);
        assert_eq!(found[0].date, Some(ymd(2025, 12, 4)));
        assert!(found[0].date_in_context);
        assert!(found[0].context.contains("Latest draw"));
    }

    #[test]
    fn test_word_breaks_sequence() {
        let html = "<p>6 11 20 and 28 33 43 16</p>";
        let rules = GameRules::toto();
        assert!(FreeText.parse(&Page::new(html), &ctx(&rules)).is_empty());
    }

    #[test]
    fn test_out_of_range_breaks_sequence() {
        let html = "<p>6 11 20 99 28 33 43 16</p>";
        let rules = GameRules::toto();
        assert!(FreeText.parse(&Page::new(html), &ctx(&rules)).is_empty());
    }

    #[test]
    fn test_secondary_repeating_primary_skipped() {
        let html = "<p>TOTO 04 Dec 2025 : 6 11 20 28 33 43 43</p>";
        let rules = GameRules::toto();
        assert!(FreeText.parse(&Page::new(html), &ctx(&rules)).is_empty());
    }

    #[test]
    fn test_repeated_value_run_skipped() {
        let html = "<p>5 5 12 20 31 40 9</p>";
        let rules = GameRules::toto();
        assert!(FreeText.parse(&Page::new(html), &ctx(&rules)).is_empty());
    }
}
