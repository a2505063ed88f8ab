//! Text helpers shared by every strategy: date grammar, visible text,
//! integer tokens and run detection.

use crate::models::GameRules;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Node};
use std::collections::HashSet;
use std::sync::LazyLock;

// ── Dates ─────────────────────────────────────────────────────────────────────

static DMY_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap());
static ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[\s-]+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s-]+(\d{4}|\d{2})\b")
        .unwrap()
});
static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})\b")
        .unwrap()
});
static DRAW_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdraw\s*(?:no\.?|number|#)?\s*:?\s*(\d{3,6})\b").unwrap()
});
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+|[^\W\d_]+").unwrap());

/// A date found in free text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch {
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

fn month_number(name: &str) -> Option<u32> {
    let m = match name.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

fn full_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

/// Every recognisable calendar date in `text`, in order of appearance.
/// Overlapping matches keep the earliest, longest span.
pub fn find_dates(text: &str) -> Vec<DateMatch> {
    let mut found: Vec<DateMatch> = Vec::new();

    for caps in DMY_NUMERIC.captures_iter(text) {
        let (Some(all), Ok(d), Ok(m), Ok(y)) = (
            caps.get(0),
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            found.push(DateMatch { date, start: all.start(), end: all.end() });
        }
    }

    for caps in ISO.captures_iter(text) {
        let (Some(all), Ok(y), Ok(m), Ok(d)) = (
            caps.get(0),
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            found.push(DateMatch { date, start: all.start(), end: all.end() });
        }
    }

    for caps in DAY_MONTH_YEAR.captures_iter(text) {
        let (Some(all), Ok(d), Some(m), Ok(y)) = (
            caps.get(0),
            caps[1].parse::<u32>(),
            month_number(&caps[2]),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(full_year(y), m, d) {
            found.push(DateMatch { date, start: all.start(), end: all.end() });
        }
    }

    for caps in MONTH_DAY_YEAR.captures_iter(text) {
        let (Some(all), Some(m), Ok(d), Ok(y)) = (
            caps.get(0),
            month_number(&caps[1]),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            found.push(DateMatch { date, start: all.start(), end: all.end() });
        }
    }

    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut out: Vec<DateMatch> = Vec::with_capacity(found.len());
    for m in found {
        match out.last() {
            Some(prev) if m.start < prev.end => continue,
            _ => out.push(m),
        }
    }
    out
}

/// Parse a standalone date field: "2025-12-04", "04-Dec-25", "Thu, 04 Dec 2025",
/// "Dec 4, 2025", "04/12/2025". Legacy "Sept" spellings are accepted.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // Drop a leading weekday ("Thu, ").
    let s = match s.split_once(',') {
        Some((head, tail)) if head.trim().chars().all(|c| c.is_ascii_alphabetic()) => tail.trim(),
        _ => s,
    };
    let s = s.replace("Sept", "Sep").replace("sept", "sep");

    for fmt in ["%Y-%m-%d", "%d-%b-%y", "%d-%b-%Y", "%d %B %Y", "%B %d, %Y", "%B %d %Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return Some(d);
        }
    }
    // Timestamps such as "2025-12-04T18:30:00+08:00".
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

/// True when `date` lies in `today - horizon_days ..= today`.
pub fn is_recent(date: NaiveDate, today: NaiveDate, horizon_days: i64) -> bool {
    date <= today && (today - date).num_days() <= horizon_days
}

/// First "Draw No. 4136"-style number in `text`.
pub fn find_draw_number(text: &str) -> Option<u32> {
    DRAW_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ── Visible text ──────────────────────────────────────────────────────────────

/// Text content of an HTML document minus script/style bodies, with
/// whitespace collapsed. Plain-text input passes through unchanged apart from
/// whitespace.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_ascii_lowercase()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript"));
        if hidden {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            parts.push(collapsed);
        }
    }

    parts.join(" ")
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|n| lower.contains(&n.to_lowercase()))
}

// ── Tokens and runs ───────────────────────────────────────────────────────────

/// One word or integer in a text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// `None` for words. Integers too large for `u32` saturate and therefore
    /// never fall in range.
    pub value: Option<u32>,
    pub start: usize,
    pub end: usize,
}

pub fn tokens(text: &str) -> Vec<Token> {
    TOKEN
        .find_iter(text)
        .map(|m| {
            let s = m.as_str();
            let value = if s.as_bytes()[0].is_ascii_digit() {
                Some(s.parse::<u32>().unwrap_or(u32::MAX))
            } else {
                None
            };
            Token { value, start: m.start(), end: m.end() }
        })
        .collect()
}

/// Integers in `text` with words skipped.
pub fn integers(text: &str) -> Vec<Option<u32>> {
    tokens(text).into_iter().filter_map(|t| t.value.map(Some)).collect()
}

/// Parse a cell that holds nothing but one integer.
pub fn cell_integer(text: &str) -> Option<u32> {
    let t = text.trim();
    if t.is_empty() || t.len() > 9 || !t.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}

pub fn all_distinct(values: &[u32]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(*v))
}

/// Non-overlapping windows of `len` consecutive distinct values in which the
/// first `rules.pick` are primaries and the rest are valid secondaries,
/// paired with the index of their first value. A `None` or out-of-range
/// value breaks a run; windows with a repeated value are skipped, never
/// repaired.
pub fn find_runs(values: &[Option<u32>], rules: &GameRules, len: usize) -> Vec<(usize, Vec<u32>)> {
    let mut runs = Vec::new();
    if len < rules.pick || values.len() < len {
        return runs;
    }

    let valid_at = |offset: usize, v: Option<u32>| match v {
        Some(n) if offset < rules.pick => rules.in_range(n),
        Some(n) => rules.secondary_in_range(n),
        None => false,
    };

    let mut i = 0;
    while i + len <= values.len() {
        let window = &values[i..i + len];
        if window.iter().enumerate().all(|(off, v)| valid_at(off, *v)) {
            let run: Vec<u32> = window.iter().flatten().copied().collect();
            if all_distinct(&run) {
                runs.push((i, run));
                i += len;
                continue;
            }
        }
        i += 1;
    }
    runs
}

// ── Tests ─────────────────────────────────────────────────────────────────────
