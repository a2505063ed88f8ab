use super::{snippet, Page, ParseContext, Strategy};
use crate::models::{Candidate, GameRules, StrategyKind};
use crate::scraper::cleaner::{all_distinct, cell_integer, collapse_whitespace, find_dates, find_draw_number, parse_date};
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static MARKED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[class], [id]").unwrap());

const DATE_MARKERS: &[&str] = &["drawdate", "draw-date", "draw_date", "resultdate"];
const DRAW_NO_MARKERS: &[&str] = &["drawnumber", "draw-number", "draw_number", "drawno"];

/// Elements whose `class`/`id` name what they hold (`win1`, `additional`,
/// `drawDate`, ...). Groups of `pick` primaries are paired in page order with
/// the dates, draw numbers and secondaries found the same way.
pub struct Labelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Date,
    DrawNumber,
    Secondary,
    Primary,
}

fn marker(el: &ElementRef, rules: &GameRules) -> Option<Marker> {
    let v = el.value();
    let attrs = format!("{} {}", v.attr("class").unwrap_or(""), v.attr("id").unwrap_or("")).to_lowercase();
    let matches_any = |markers: &[&str]| markers.iter().any(|m| attrs.contains(m));

    if matches_any(DATE_MARKERS) {
        Some(Marker::Date)
    } else if matches_any(DRAW_NO_MARKERS) {
        Some(Marker::DrawNumber)
    } else if matches_any(rules.secondary_markers) {
        Some(Marker::Secondary)
    } else if matches_any(rules.primary_markers) {
        Some(Marker::Primary)
    } else {
        None
    }
}

/// Wrappers such as `<div class="additional-wrap">` around a marked element.
fn wraps_marked(el: &ElementRef, rules: &GameRules) -> bool {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| marker(&d, rules).is_some())
}

fn text_of(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the nearest table (or the parent) around an element.
fn container_text(el: &ElementRef) -> String {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .or_else(|| el.parent().and_then(ElementRef::wrap))
        .map(|c| text_of(&c))
        .unwrap_or_default()
}

impl Strategy for Labelled {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Labelled
    }

    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
        let rules = ctx.rules;
        let mut primaries: Vec<(u32, String)> = Vec::new();
        let mut secondaries: Vec<u32> = Vec::new();
        let mut dates = Vec::new();
        let mut draw_numbers = Vec::new();

        for el in page.doc.select(&MARKED) {
            let Some(kind) = marker(&el, rules) else { continue };
            if wraps_marked(&el, rules) {
                continue;
            }
            let text = text_of(&el);

            match kind {
                Marker::Date => {
                    if let Some(d) = parse_date(&text).or_else(|| find_dates(&text).first().map(|m| m.date)) {
                        dates.push(d);
                    }
                }
                Marker::DrawNumber => {
                    if let Some(n) = find_draw_number(&text).or_else(|| cell_integer(&text)) {
                        draw_numbers.push(n);
                    }
                }
                Marker::Secondary => {
                    if let Some(n) = cell_integer(&text).filter(|n| rules.secondary_in_range(*n)) {
                        secondaries.push(n);
                    }
                }
                Marker::Primary => {
                    if let Some(n) = cell_integer(&text).filter(|n| rules.in_range(*n)) {
                        let context = if primaries.len() % rules.pick == 0 { container_text(&el) } else { String::new() };
                        primaries.push((n, context));
                    }
                }
            }
        }

        let mut out = Vec::new();
        let m = rules.secondary_count;
        for (group, chunk) in primaries.chunks_exact(rules.pick).enumerate() {
            let primary: Vec<u32> = chunk.iter().map(|(n, _)| *n).collect();
            if !all_distinct(&primary) {
                continue;
            }
            let secondary: Vec<u32> = secondaries.iter().skip(group * m).take(m).copied().collect();

            let mut cand = Candidate::new(StrategyKind::Labelled, primary, secondary);
            cand.date = dates.get(group).copied();
            cand.date_in_context = cand.date.is_some();
            cand.draw_number = draw_numbers.get(group).copied();
            cand.context = snippet(&chunk[0].1);
            cand.first_in_container = group == 0;
            out.push(cand);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_results_page_markers() {
        let rules = GameRules::toto();
        let found = Labelled.parse(&Page::new(RESULTS_PAGE), &ctx(&rules));
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.primary, vec![6, 11, 20, 28, 33, 43]);
        assert_eq!(c.secondary, vec![16]);
        assert_eq!(c.date, Some(ymd(2025, 12, 4)));
        assert_eq!(c.draw_number, Some(4136));
        assert!(c.context.contains("Winning Numbers"));
    }

    #[test]
    fn test_incomplete_group_ignored() {
        let html = r#"<span class="win1">6</span><span class="win2">11</span>"#;
        let rules = GameRules::toto();
        assert!(Labelled.parse(&Page::new(html), &ctx(&rules)).is_empty());
    }

    #[test]
    fn test_wrapped_markers_count_once() {
        let html = r#"
            <div class="draw"><span class="drawDate">Thu, 04 Dec 2025</span>
              <span class="win1">6</span><span class="win2">11</span><span class="win3">20</span>
              <span class="win4">28</span><span class="win5">33</span><span class="win6">43</span>
              <div class="additional-wrap"><span class="additional">16</span></div></div>
            <div class="draw"><span class="drawDate">Mon, 01 Dec 2025</span>
              <span class="win1">2</span><span class="win2">10</span><span class="win3">24</span>
              <span class="win4">35</span><span class="win5">45</span><span class="win6">49</span>
              <div class="additional-wrap"><span class="additional">39</span></div></div>"#;
        let rules = GameRules::toto();
        let found = Labelled.parse(&Page::new(html), &ctx(&rules));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].secondary, vec![16]);
        assert_eq!(found[1].primary, vec![2, 10, 24, 35, 45, 49]);
        assert_eq!(found[1].secondary, vec![39]);
        assert_eq!(found[1].date, Some(ymd(2025, 12, 1)));
    }

    #[test]
    fn test_four_d_prize_classes() {
        let html = r#"<table class="table">
            <tr><th class="drawDate">Sat, 23 Aug 2025</th><th class="drawNumber">Draw No. 5369</th></tr>
            <tr><td class="tdFirstPrize">2250</td><td class="tdSecondPrize">0419</td><td class="tdThirdPrize">7783</td></tr>
            <tr><td class="tdStarterPrize">0001</td><td class="tdConsolation">0002</td></tr></table>"#;
        let rules = GameRules::four_d();
        let found = Labelled.parse(&Page::new(html), &ctx(&rules));
        assert_eq!(found[0].primary, vec![2250, 419, 7783]);
        assert_eq!(found[0].secondary, vec![1, 2]);
        assert_eq!(found[0].draw_number, Some(5369));
    }
}
