use super::{snippet, Page, ParseContext, Strategy};
use crate::models::{Candidate, GameRules, StrategyKind};
use crate::scraper::cleaner::{all_distinct, parse_date};
use regex::Regex;
use scraper::Selector;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static FLAT_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]{2,4000}\}").unwrap());

// Field names after lowercasing and stripping '_' / '-'.
const DATE_KEYS: &[&str] = &["drawdate", "date", "resultdate", "drawdatetime"];
const DRAW_NO_KEYS: &[&str] = &["drawnumber", "drawno", "drawid"];
const NUMBER_KEYS: &[&str] = &["winningnumbers", "winningnumber", "numbers", "mainnumbers", "winning"];
const ORDERED_KEYS: &[&[&str]] = &[&["first", "1st", "firstprize"], &["second", "2nd", "secondprize"], &["third", "3rd", "thirdprize"]];
const SECONDARY_KEYS: &[&str] = &["additionalnumber", "additional", "bonus", "bonusnumber", "supplementary", "starter", "consolation"];

/// Embedded JSON: `<script>` payloads and inline `{...}` fragments.
pub struct StructuredData;

fn normalise_key(k: &str) -> String {
    k.chars().filter(|c| *c != '_' && *c != '-').flat_map(char::to_lowercase).collect()
}

fn as_number(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Arrays of numbers or numeric strings, or one delimited string ("6,11,20").
fn as_numbers(v: &Value) -> Vec<u32> {
    match v {
        Value::Array(items) => items.iter().filter_map(as_number).collect(),
        Value::String(s) => s
            .split(|c: char| !c.is_ascii_digit())
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect(),
        Value::Number(_) => as_number(v).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn extract(obj: &Map<String, Value>, rules: &GameRules) -> Option<Candidate> {
    let fields: HashMap<String, &Value> = obj.iter().map(|(k, v)| (normalise_key(k), v)).collect();
    let field = |keys: &[&str]| keys.iter().find_map(|k| fields.get(*k).copied());

    let mut primary = field(NUMBER_KEYS).map(as_numbers).unwrap_or_default();
    if primary.is_empty() {
        primary = ORDERED_KEYS
            .iter()
            .map_while(|names| field(*names).and_then(as_number))
            .collect();
    }
    if primary.len() < rules.pick {
        return None;
    }

    let mut secondary: Vec<u32> = SECONDARY_KEYS
        .iter()
        .filter_map(|k| fields.get(*k))
        .flat_map(|v| as_numbers(v))
        .collect();
    // A single list may carry primaries and secondaries together.
    let extra = primary.split_off(rules.pick);
    if secondary.is_empty() {
        secondary = extra;
    }
    secondary.truncate(rules.secondary_count);

    if !all_distinct(&primary) || !primary.iter().all(|n| rules.in_range(*n)) {
        return None;
    }

    let mut cand = Candidate::new(StrategyKind::Structured, primary, secondary);
    cand.date = field(DATE_KEYS).and_then(Value::as_str).and_then(parse_date);
    cand.date_in_context = cand.date.is_some();
    cand.draw_number = field(DRAW_NO_KEYS).and_then(as_number);
    cand.context = snippet(&Value::Object(obj.clone()).to_string());
    Some(cand)
}

fn walk(value: &Value, rules: &GameRules, out: &mut Vec<Candidate>) {
    match value {
        Value::Object(obj) => {
            if let Some(c) = extract(obj, rules) {
                out.push(c);
            }
            for v in obj.values() {
                walk(v, rules, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, rules, out);
            }
        }
        _ => {}
    }
}

/// JSON payload of a script body, allowing a `var x = {...};` wrapper.
fn script_json(body: &str) -> Option<Value> {
    let body = body.trim();
    if let Ok(v) = serde_json::from_str(body) {
        return Some(v);
    }
    let start = body.find(['{', '['])?;
    let end = body.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

impl Strategy for StructuredData {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structured
    }

    fn parse(&self, page: &Page, ctx: &ParseContext) -> Vec<Candidate> {
        let mut out = Vec::new();

        for script in page.doc.select(&SCRIPT) {
            let body: String = script.text().collect();
            let Some(value) = script_json(&body) else { continue };
            let before = out.len();
            walk(&value, ctx.rules, &mut out);
            if let Some(first) = out.get_mut(before) {
                first.first_in_container = true;
            }
        }

        // Inline fragments, e.g. data attributes holding escaped JSON.
        if out.is_empty() {
            let unescaped = page.html.replace("&quot;", "\"");
            for m in FLAT_OBJECT.find_iter(&unescaped) {
                let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(m.as_str()) else { continue };
                if let Some(mut c) = extract(&obj, ctx.rules) {
                    c.first_in_container = out.is_empty();
                    out.push(c);
                }
            }
        }
        out
    }
}
