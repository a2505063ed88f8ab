//! Pipeline orchestrator: fetch → strategies → score → select → validate → merge.
//!
//! One run reads the store once and writes it at most once. Network calls are
//! the only suspension points; everything after the fetch is synchronous over
//! the page bodies already in memory.
//!
//! Transport failures, parse misses and validation rejections all end in
//! [`RunOutcome::NoCandidateFound`]. Only store I/O surfaces as an error.

pub mod scorer;
pub mod selector;
pub mod validator;

use crate::config::AppConfig;
use crate::models::{Candidate, GameRules, NoCandidateReason, RunOutcome};
use crate::scraper::{collect_pages, FetchError, HttpFetcher, PageSource};
use crate::storage::{CsvStore, MergeEngine, MergeOutcome};
use crate::strategies::{self, Page, ParseContext, Strategy};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

pub struct Pipeline {
    config: AppConfig,
    rules: GameRules,
    strategies: Vec<Box<dyn Strategy>>,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let rules = config.game.name.rules();
        Self {
            config,
            rules,
            strategies: strategies::default_set(),
            dry_run: false,
        }
    }

    /// Decide the merge but never write the store.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    fn parse_context(&self, today: NaiveDate) -> ParseContext<'_> {
        ParseContext {
            rules: &self.rules,
            today,
            horizon_days: self.config.strategies.horizon_days,
            window_chars: self.config.strategies.window_chars,
        }
    }

    /// One run against the configured endpoints, dated by the local clock.
    pub async fn run(&self) -> Result<RunOutcome> {
        let fetcher = HttpFetcher::new(&self.config.fetcher).context("Failed to build HTTP client")?;
        let today = Local::now().date_naive();
        self.run_with(&fetcher, today).await
    }

    pub async fn run_with(&self, source: &dyn PageSource, today: NaiveDate) -> Result<RunOutcome> {
        let storage = &self.config.storage;
        let store = CsvStore::open(&storage.csv_path, self.rules.clone(), &storage.date_format)
            .with_context(|| format!("Failed to load store {:?}", storage.csv_path))?;
        match store.head() {
            Some(head) => info!("Store has {} records, head {}", store.len(), head),
            None => info!("Store is empty"),
        }

        // ── 1. Fetch ──────────────────────────────────────────────────────────
        let fetcher = &self.config.fetcher;
        let pages = match collect_pages(source, &fetcher.endpoints, self.rules.keywords, fetcher.exhaustive).await {
            Ok(pages) => pages,
            Err(FetchError::Exhausted(failures)) => {
                warn!("No usable page from {} endpoint(s)", failures.len());
                let reasons = failures.iter().map(|f| f.to_string()).collect();
                return Ok(RunOutcome::NoCandidateFound(NoCandidateReason::Transport(reasons)));
            }
            Err(e) => {
                return Ok(RunOutcome::NoCandidateFound(NoCandidateReason::Transport(vec![e.to_string()])));
            }
        };

        // ── 2. Extract, score, select ─────────────────────────────────────────
        let bodies: Vec<&str> = pages.iter().map(|p| p.body.as_str()).collect();
        let candidates = self.extract_candidates(&bodies, today);
        info!("{} candidate(s) from {} page(s)", candidates.len(), pages.len());

        let Some(best) = selector::select(candidates) else {
            warn!("No strategy produced a candidate");
            return Ok(RunOutcome::NoCandidateFound(NoCandidateReason::NothingParsed));
        };
        info!("Best candidate: {}", best);

        // ── 3. Validate ───────────────────────────────────────────────────────
        let record = match validator::validate(&best, &self.rules, today) {
            Ok(record) => record,
            Err(rejection) => {
                warn!("Rejected {}: {}", best, rejection);
                return Ok(RunOutcome::NoCandidateFound(NoCandidateReason::Rejected(rejection.to_string())));
            }
        };

        // ── 4. Merge ──────────────────────────────────────────────────────────
        let engine = MergeEngine::new(store);
        let outcome = if self.dry_run {
            let preview = engine.preview(&record);
            info!("Dry run: store left untouched ({:?})", preview);
            preview
        } else {
            engine.merge(record).context("Failed to write store")?
        };

        Ok(match outcome {
            MergeOutcome::Merged(record) => {
                info!("Merged {}", record);
                RunOutcome::Updated(record)
            }
            MergeOutcome::Unchanged => {
                info!("Store already up to date");
                RunOutcome::Unchanged
            }
        })
    }

    /// Every strategy over every body, scored, in gathering order.
    pub fn extract_candidates(&self, bodies: &[&str], today: NaiveDate) -> Vec<Candidate> {
        let ctx = self.parse_context(today);
        let mut candidates = Vec::new();
        for body in bodies {
            let page = Page::new(body);
            candidates.extend(strategies::run_all(&self.strategies, &page, &ctx));
        }
        scorer::score_all(&mut candidates, &self.rules, today, ctx.horizon_days);
        for c in &candidates {
            debug!("{}", c);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::models::DrawRecord;
    use crate::scraper::testing::FakeSource;
    use crate::storage::testing::store_file;
    use crate::strategies::fixtures::RESULTS_PAGE;
    use std::fs;
    use std::path::Path;

    const PRIMARY: &str = "https://primary.test/toto";
    const FALLBACK: &str = "https://fallback.test/toto";
    const DEC_1: &str = "2025-12-01,2,10,24,35,45,49,39\n";

    const DEC_4_PAGE: &str = "<html><body><h2>TOTO Results</h2>\
        <p>Draw date: Thu, 04 Dec 2025</p>\
        <p>Winning Numbers: 6, 11, 20, 28, 33, 43 Additional Number: 16</p></body></html>";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 5).unwrap()
    }

    fn pipeline(store: &Path) -> Pipeline {
        let mut config = AppConfig::default();
        config.fetcher.endpoints = vec![Endpoint::new(PRIMARY), Endpoint::new(FALLBACK)];
        config.storage.csv_path = store.to_path_buf();
        Pipeline::new(config)
    }

    fn dec_4() -> DrawRecord {
        DrawRecord {
            date: NaiveDate::from_ymd_opt(2025, 12, 4).unwrap(),
            draw_number: None,
            primary: vec![6, 11, 20, 28, 33, 43],
            secondary: vec![16],
        }
    }

    #[tokio::test]
    async fn test_new_draw_is_prepended() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default().with(PRIMARY, Ok(DEC_4_PAGE));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Updated(dec_4()));

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("2025-12-04,6,11,20,28,33,43,16\n{}", DEC_1));
        assert_eq!(source.request_log(), vec![PRIMARY.to_string()]);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default().with(PRIMARY, Ok(DEC_4_PAGE));
        let p = pipeline(&path);

        assert!(matches!(p.run_with(&source, today()).await.unwrap(), RunOutcome::Updated(_)));
        let after_first = fs::read(&path).unwrap();
        assert_eq!(p.run_with(&source, today()).await.unwrap(), RunOutcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_results_page_layout() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default().with(PRIMARY, Ok(RESULTS_PAGE));

        match pipeline(&path).run_with(&source, today()).await.unwrap() {
            RunOutcome::Updated(rec) => {
                assert_eq!(rec.primary, vec![6, 11, 20, 28, 33, 43]);
                assert_eq!(rec.secondary, vec![16]);
                assert_eq!(rec.draw_number, Some(4136));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_value_leaves_store_alone() {
        let (_dir, path) = store_file(DEC_1);
        let page = "<p>TOTO draw Thu, 04 Dec 2025</p><p>Winning Numbers 5, 5, 12, 20, 31, 40 Additional 9</p>";
        let source = FakeSource::default().with(PRIMARY, Ok(page));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::NoCandidateFound(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEC_1);
    }

    #[tokio::test]
    async fn test_future_draw_is_rejected() {
        let (_dir, path) = store_file(DEC_1);
        let page = r#"<title>TOTO</title><script>{"drawDate":"2025-12-09",
            "winningNumbers":[6,11,20,28,33,43],"additionalNumber":16}</script>"#;
        let source = FakeSource::default().with(PRIMARY, Ok(page));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::NoCandidateFound(NoCandidateReason::Rejected(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEC_1);
    }

    #[tokio::test]
    async fn test_all_endpoints_503() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default().with(PRIMARY, Err(503)).with(FALLBACK, Err(503));

        match pipeline(&path).run_with(&source, today()).await.unwrap() {
            RunOutcome::NoCandidateFound(NoCandidateReason::Transport(failures)) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("503"));
            }
            other => panic!("expected transport failure, got {:?}", other),
        }
        assert_eq!(source.request_log().len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), DEC_1);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_endpoint() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default()
            .with(PRIMARY, Ok("<p>maintenance</p>"))
            .with(FALLBACK, Ok(DEC_4_PAGE));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Updated(dec_4()));
        assert_eq!(source.request_log().len(), 2);
    }

    #[tokio::test]
    async fn test_older_draw_never_reorders_store() {
        let contents = format!("2025-12-04,6,11,20,28,33,43,16\n{}", DEC_1);
        let (_dir, path) = store_file(&contents);
        let page = "<p>TOTO draw Mon, 01 Dec 2025</p><p>Winning Numbers 2, 10, 24, 35, 45, 49 Additional 39</p>";
        let source = FakeSource::default().with(PRIMARY, Ok(page));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn test_history_table_oldest_first() {
        let (_dir, path) = store_file("2025-11-27,1,9,17,25,33,41,5\n");
        let page = "<h1>TOTO</h1><table><tr><th>Date</th><th colspan=\"7\">Winning Numbers</th></tr>\
            <tr><td>01 Dec 2025</td><td>3</td><td>10</td><td>24</td><td>35</td><td>45</td><td>40</td><td>39</td></tr>\
            <tr><td>04 Dec 2025</td><td>6</td><td>11</td><td>20</td><td>28</td><td>33</td><td>43</td><td>16</td></tr></table>";
        let source = FakeSource::default().with(PRIMARY, Ok(page));

        let outcome = pipeline(&path).run_with(&source, today()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Updated(dec_4()));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("2025-12-04,6,11,20,28,33,43,16\n2025-11-27,"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let (_dir, path) = store_file(DEC_1);
        let source = FakeSource::default().with(PRIMARY, Ok(DEC_4_PAGE));

        let outcome = pipeline(&path).dry_run(true).run_with(&source, today()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Updated(dec_4()));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEC_1);
    }

    #[test]
    fn test_missing_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::default().with(PRIMARY, Ok(DEC_4_PAGE));
        let p = pipeline(&dir.path().join("missing.csv"));

        let result = tokio_test::block_on(p.run_with(&source, today()));
        assert!(result.is_err());
        assert!(source.request_log().is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir.path().join("unused.csv"));
        let a = selector::select(p.extract_candidates(&[RESULTS_PAGE, DEC_4_PAGE], today()));
        let b = selector::select(p.extract_candidates(&[RESULTS_PAGE, DEC_4_PAGE], today()));
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}
