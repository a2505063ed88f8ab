use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Game ──────────────────────────────────────────────────────────────────────

/// Page family the pipeline is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    Toto,
    FourD,
}

impl Game {
    pub fn rules(self) -> GameRules {
        match self {
            Game::Toto => GameRules::toto(),
            Game::FourD => GameRules::four_d(),
        }
    }
}

/// Fixed record shape of one draw game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    pub name: &'static str,
    /// Number of primary values (k).
    pub pick: usize,
    pub min: u32,
    pub max: u32,
    /// Maximum number of secondary values (m).
    pub secondary_count: usize,
    pub secondary_min: u32,
    pub secondary_max: u32,
    /// Zero-pad width when rendering; 0 means plain integers.
    pub width: usize,
    /// Cheap relevance filter applied to fetched pages.
    pub keywords: &'static [&'static str],
    /// Tables containing any of these are prize breakdowns, not results.
    pub exclusions: &'static [&'static str],
    /// `class`/`id` fragments marking primary number elements.
    pub primary_markers: &'static [&'static str],
    /// `class`/`id` fragments marking secondary number elements.
    pub secondary_markers: &'static [&'static str],
}

impl GameRules {
    pub fn toto() -> Self {
        Self {
            name: "toto",
            pick: 6,
            min: 1,
            max: 49,
            secondary_count: 1,
            secondary_min: 1,
            secondary_max: 49,
            width: 0,
            keywords: &["toto", "winning numbers", "additional number"],
            exclusions: &["group 1", "group i", "prize", "share", "$", "starter", "consolation"],
            primary_markers: &["win1", "win2", "win3", "win4", "win5", "win6", "winning-number", "winningnumber"],
            secondary_markers: &["additional", "bonus", "supplementary"],
        }
    }

    pub fn four_d() -> Self {
        Self {
            name: "four_d",
            pick: 3,
            min: 0,
            max: 9999,
            secondary_count: 20,
            secondary_min: 0,
            secondary_max: 9999,
            width: 4,
            keywords: &["4d", "1st prize", "first prize"],
            exclusions: &["$", "share amount", "winning shares"],
            primary_markers: &["firstprize", "secondprize", "thirdprize", "first-prize", "second-prize", "third-prize"],
            secondary_markers: &["starter", "consolation"],
        }
    }

    pub fn in_range(&self, n: u32) -> bool {
        (self.min..=self.max).contains(&n)
    }

    pub fn secondary_in_range(&self, n: u32) -> bool {
        (self.secondary_min..=self.secondary_max).contains(&n)
    }

    /// Length of a complete run: primaries followed by every secondary.
    pub fn run_len(&self) -> usize {
        self.pick + self.secondary_count
    }

    pub fn render(&self, n: u32) -> String {
        format!("{:0width$}", n, width = self.width)
    }
}

// ── Draw record ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub date: NaiveDate,
    pub draw_number: Option<u32>,
    pub primary: Vec<u32>,
    pub secondary: Vec<u32>,
}

impl DrawRecord {
    /// Identity match: date always, draw number only when both sides carry one.
    pub fn same_identity(&self, other: &DrawRecord) -> bool {
        if self.date != other.date {
            return false;
        }
        match (self.draw_number, other.draw_number) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for DrawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.date)?;
        for (i, n) in self.primary.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", n)?;
        }
        write!(f, "]")?;
        if !self.secondary.is_empty() {
            let rest: Vec<String> = self.secondary.iter().map(|n| n.to_string()).collect();
            write!(f, " + {}", rest.join(", "))?;
        }
        if let Some(no) = self.draw_number {
            write!(f, " (draw {})", no)?;
        }
        Ok(())
    }
}

// ── Candidate ─────────────────────────────────────────────────────────────────

/// Which parsing heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Structural,
    DateAnchored,
    Structured,
    Labelled,
    FreeText,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Structural => "structural",
            StrategyKind::DateAnchored => "date-anchored",
            StrategyKind::Structured => "structured",
            StrategyKind::Labelled => "labelled",
            StrategyKind::FreeText => "free-text",
        };
        f.write_str(s)
    }
}

/// Unvalidated draw produced by one strategy during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub date: Option<NaiveDate>,
    pub draw_number: Option<u32>,
    pub primary: Vec<u32>,
    pub secondary: Vec<u32>,
    pub strategy: StrategyKind,
    /// Text surrounding the extraction site, lowercased by the scorer.
    pub context: String,
    /// The date was found next to the numbers rather than elsewhere on the page.
    pub date_in_context: bool,
    pub first_in_container: bool,
    pub confidence: u32,
}

impl Candidate {
    pub fn new(strategy: StrategyKind, primary: Vec<u32>, secondary: Vec<u32>) -> Self {
        Self {
            date: None,
            draw_number: None,
            primary,
            secondary,
            strategy,
            context: String::new(),
            date_in_context: false,
            first_in_container: false,
            confidence: 0,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.map(|d| d.to_string()).unwrap_or_else(|| "????-??-??".into());
        write!(
            f,
            "{} {:?} + {:?} conf={} via {}",
            date, self.primary, self.secondary, self.confidence, self.strategy
        )
    }
}

// ── Run result ────────────────────────────────────────────────────────────────

/// Why a run ended without a merge candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum NoCandidateReason {
    /// Every endpoint failed or returned irrelevant content.
    Transport(Vec<String>),
    /// Pages were fetched but no strategy produced anything.
    NothingParsed,
    /// The best candidate failed validation.
    Rejected(String),
}

impl fmt::Display for NoCandidateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoCandidateReason::Transport(failures) => {
                write!(f, "all endpoints failed: {}", failures.join("; "))
            }
            NoCandidateReason::NothingParsed => f.write_str("no strategy produced a candidate"),
            NoCandidateReason::Rejected(reason) => write!(f, "best candidate rejected: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Updated(DrawRecord),
    Unchanged,
    NoCandidateFound(NoCandidateReason),
}
