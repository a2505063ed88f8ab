use crate::models::{Candidate, DrawRecord, GameRules};
use chrono::NaiveDate;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("expected {expected} primary numbers, got {got}")]
    WrongCount { expected: usize, got: usize },

    #[error("at most {max} secondary numbers allowed, got {got}")]
    TooManySecondary { max: usize, got: usize },

    #[error("primary number {0} appears more than once")]
    Duplicate(u32),

    #[error("secondary number {0} repeats a primary number")]
    SecondaryRepeatsPrimary(u32),

    #[error("number {value} outside {min}..={max}")]
    OutOfRange { value: u32, min: u32, max: u32 },

    #[error("no draw date")]
    MissingDate,

    #[error("draw date {date} is after {today}")]
    FutureDate { date: NaiveDate, today: NaiveDate },
}

/// Turn a candidate into a record, or say why it cannot be one.
pub fn validate(candidate: &Candidate, rules: &GameRules, today: NaiveDate) -> Result<DrawRecord, Rejection> {
    if candidate.primary.len() != rules.pick {
        return Err(Rejection::WrongCount { expected: rules.pick, got: candidate.primary.len() });
    }
    if candidate.secondary.len() > rules.secondary_count {
        return Err(Rejection::TooManySecondary { max: rules.secondary_count, got: candidate.secondary.len() });
    }

    let mut seen = HashSet::new();
    for &n in &candidate.primary {
        if !seen.insert(n) {
            return Err(Rejection::Duplicate(n));
        }
        if !rules.in_range(n) {
            return Err(Rejection::OutOfRange { value: n, min: rules.min, max: rules.max });
        }
    }
    if let Some(&n) = candidate.secondary.iter().find(|n| !rules.secondary_in_range(**n)) {
        return Err(Rejection::OutOfRange { value: n, min: rules.secondary_min, max: rules.secondary_max });
    }
    if let Some(&n) = candidate.secondary.iter().find(|n| candidate.primary.contains(n)) {
        return Err(Rejection::SecondaryRepeatsPrimary(n));
    }

    let date = candidate.date.ok_or(Rejection::MissingDate)?;
    if date > today {
        return Err(Rejection::FutureDate { date, today });
    }

    Ok(DrawRecord {
        date,
        draw_number: candidate.draw_number,
        primary: candidate.primary.clone(),
        secondary: candidate.secondary.clone(),
    })
}
