use super::{slice_chars, snippet, Page, ParseContext, Strategy};
use crate::models::{Candidate, StrategyKind};
use crate::scraper::cleaner::{find_dates, find_draw_number, find_runs, integers};

/// Numbers published next to a recent date.
///
/// For each in-horizon date (most recent first) the text right after it, then
/// right before it, is searched for a complete run. Other dates inside the
/// window are blanked so their digits cannot leak into the run.
pub struct DateAnchored;

fn blank_dates(segment: &str) -> String {
    let mut out = segment.to_string();
    for m in find_dates(segment).into_iter().rev() {
        out.replace_range(m.start..m.end, &" ".repeat(m.end - m.start));
    }
    out
}

impl Strategy for DateAnchored {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DateAnchored
    }

    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
        let text = page.text.as_str();
        let rules = ctx.rules;

        let mut anchors: Vec<_> = find_dates(text).into_iter().filter(|m| ctx.is_recent(m.date)).collect();
        // Stable: equal dates keep page order.
        anchors.sort_by(|a, b| b.date.cmp(&a.date));

        let mut out = Vec::new();
        for anchor in anchors {
            let after = slice_chars(text, anchor.end, anchor.end + ctx.window_chars);
            let before = slice_chars(text, anchor.start.saturating_sub(ctx.window_chars), anchor.start);

            let found = [(after, false), (before, true)].into_iter().find_map(|(segment, take_last)| {
                let cleaned = blank_dates(segment);
                let runs = find_runs(&integers(&cleaned), rules, rules.run_len());
                let run = if take_last { runs.into_iter().last() } else { runs.into_iter().next() };
                run.map(|(_, values)| (segment, values))
            });

            let Some((segment, values)) = found else { continue };
            let (primary, secondary) = values.split_at(rules.pick);

            let mut cand = Candidate::new(StrategyKind::DateAnchored, primary.to_vec(), secondary.to_vec());
            cand.date = Some(anchor.date);
            cand.date_in_context = true;
            cand.first_in_container = true;
            cand.draw_number = find_draw_number(segment);
            cand.context = snippet(segment);
            out.push(cand);
        }
        out
    }
}
