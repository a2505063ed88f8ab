use super::{snippet, Page, ParseContext, Strategy};
use crate::models::{Candidate, GameRules, StrategyKind};
use crate::scraper::cleaner::{all_distinct, cell_integer, collapse_whitespace, contains_any, find_dates, find_draw_number};
use chrono::NaiveDate;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

/// Table rows: integer-only cells of every non-prize table.
///
/// A run is dated by its own row, else by the nearest date cell above it in
/// the same table, else by the page (not counted as contextual).
pub struct Structural;

fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn date_of(text: &str) -> Option<NaiveDate> {
    find_dates(text).first().map(|m| m.date)
}

/// Runs of `pick` distinct in-range values followed by up to
/// `secondary_count` more, as `(start index, primary, secondary)`.
fn cell_runs(cells: &[Option<u32>], rules: &GameRules) -> Vec<(usize, Vec<u32>, Vec<u32>)> {
    let mut runs = Vec::new();
    let k = rules.pick;
    let mut i = 0;

    while i + k <= cells.len() {
        let window = &cells[i..i + k];
        let primary: Vec<u32> = window.iter().flatten().copied().collect();
        if primary.len() == k && primary.iter().all(|n| rules.in_range(*n)) && all_distinct(&primary) {
            let secondary: Vec<u32> = cells[i + k..]
                .iter()
                .take(rules.secondary_count)
                .map_while(|c| (*c).filter(|n| rules.secondary_in_range(*n) && !primary.contains(n)))
                .collect();
            runs.push((i, primary, secondary));
            i += k + runs.last().map_or(0, |r| r.2.len());
            continue;
        }
        i += 1;
    }
    runs
}

impl Strategy for Structural {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
        let rules = ctx.rules;
        let page_date = ctx.recent_date_in(&page.text);

        // Values from tables labelled as holding secondaries ("Additional Number").
        let mut labelled_secondaries: Vec<(usize, u32)> = Vec::new();
        for (ti, table) in page.doc.select(&TABLE).enumerate() {
            let text = element_text(&table);
            if contains_any(&text, rules.exclusions) || !contains_any(&text, rules.secondary_markers) {
                continue;
            }
            labelled_secondaries.extend(
                table
                    .select(&CELL)
                    .filter_map(|c| cell_integer(&element_text(&c)))
                    .filter(|n| rules.secondary_in_range(*n))
                    .map(|n| (ti, n)),
            );
        }

        let mut out = Vec::new();
        for (ti, table) in page.doc.select(&TABLE).enumerate() {
            let text = element_text(&table);
            if contains_any(&text, rules.exclusions) {
                continue;
            }

            // (row index, text) of every non-empty cell, in document order.
            let cells: Vec<(usize, String)> = table
                .select(&ROW)
                .enumerate()
                .flat_map(|(ri, row)| row.select(&CELL).map(|c| (ri, element_text(&c))).collect::<Vec<_>>())
                .filter(|(_, t)| !t.is_empty())
                .collect();
            let row_count = cells.iter().map(|(ri, _)| ri + 1).max().unwrap_or(0);

            let mut row_dates: Vec<Option<NaiveDate>> = vec![None; row_count];
            let mut row_texts: Vec<String> = vec![String::new(); row_count];
            for (ri, t) in &cells {
                row_texts[*ri].push_str(t);
                row_texts[*ri].push(' ');
                if row_dates[*ri].is_none() && cell_integer(t).is_none() {
                    row_dates[*ri] = date_of(t);
                }
            }

            let mut positions = Vec::new();
            let mut values = Vec::new();
            for (p, (_, t)) in cells.iter().enumerate() {
                if let Some(n) = cell_integer(t) {
                    positions.push(p);
                    values.push(Some(n).filter(|n| rules.in_range(*n) || rules.secondary_in_range(*n)));
                }
            }

            let mut found = Vec::new();
            for (start, primary, mut secondary) in cell_runs(&values, rules) {
                if secondary.len() < rules.secondary_count {
                    let missing = rules.secondary_count - secondary.len();
                    secondary.extend(
                        labelled_secondaries
                            .iter()
                            .filter(|(src, n)| *src != ti && !primary.contains(n))
                            .map(|(_, n)| *n)
                            .take(missing),
                    );
                }

                let p = positions[start];
                let row = cells[p].0;
                let local_date = row_dates[row].or_else(|| {
                    cells[..p]
                        .iter()
                        .rev()
                        .filter(|(_, t)| cell_integer(t).is_none())
                        .find_map(|(_, t)| date_of(t))
                });

                let mut cand = Candidate::new(StrategyKind::Structural, primary, secondary);
                cand.date = local_date.or(page_date);
                cand.date_in_context = local_date.is_some();
                cand.draw_number = find_draw_number(&row_texts[row]).or_else(|| find_draw_number(&text));
                cand.context = snippet(&text);
                found.push(cand);
            }

            // The most recent run leads its table; history tables may list
            // draws oldest first.
            let mut lead = 0;
            for (i, c) in found.iter().enumerate() {
                if c.date > found[lead].date {
                    lead = i;
                }
            }
            if let Some(c) = found.get_mut(lead) {
                c.first_in_container = true;
            }
            out.extend(found);
        }
        out
    }
}
