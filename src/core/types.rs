use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::core::metrics::RunMetrics;
use crate::edgar::tickers::Ticker;
use crate::recon::error::ReconError;
use crate::recon::matcher::NearMiss;
use crate::recon::model::{FilingMeta, MatchedRow, ParsedFiling};

/// Filing metadata for one company, split by form, plus whether the slower
/// full-index scan had to backstop the recent-submissions feed.
#[derive(Debug, Clone)]
pub struct FilingSet {
    pub quarterly: Vec<FilingMeta>,
    pub annual: Vec<FilingMeta>,
    pub used_fallback: bool,
}

/// Where filings come from. The reconciliation pipeline only ever talks to
/// this trait: the EDGAR client implements it over HTTP, tests implement it
/// in memory, and an alternate extraction path (narrative releases, say)
/// can substitute for it wholesale; matching and auditing never know the
/// difference.
#[async_trait]
pub trait FactSource {
    /// 10-Q and 10-K metadata for a company, newest first, bounded to
    /// periods ending in or before `max_year`.
    async fn filings(&self, ticker: &Ticker, max_year: i32) -> Result<FilingSet, ReconError>;

    /// Retrieve and lower one filing to facts + contexts + roles.
    async fn load(&self, meta: &FilingMeta) -> Result<ParsedFiling, ReconError>;

    /// Concepts the filer's presentation metadata displays sign-reversed.
    async fn negated_concepts(&self, meta: &FilingMeta) -> Result<HashSet<String>, ReconError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    SuccessWithCaveats,
}

/// Non-fatal findings accumulated across the run. Always reported, never
/// blocking.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Advisories {
    pub missing_tags: BTreeSet<String>,
    pub missing_by_role: BTreeMap<String, usize>,
    pub near_misses: Vec<NearMiss>,
    pub collision_rows: usize,
    pub new_disclosures: usize,
}

impl Advisories {
    pub fn is_clean(&self) -> bool {
        self.missing_tags.is_empty() && self.near_misses.is_empty() && self.collision_rows == 0
    }
}

/// Which filing the run reconciled, for the report header and logs.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub ticker: String,
    pub year: i32,
    pub quarter: u8,
    pub full_year: bool,
    pub label: String,
    pub form: String,
    pub accession: String,
    pub period_end: NaiveDate,
}

/// Everything a completed run hands back: the matched dataset, advisory
/// findings, and the diagnostics map. Failure never reaches this type;
/// fatal conditions surface as [`ReconError`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: TargetSummary,
    pub rows: Vec<MatchedRow>,
    pub advisories: Advisories,
    pub metrics: RunMetrics,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.advisories.is_clean() {
            RunStatus::Success
        } else {
            RunStatus::SuccessWithCaveats
        }
    }
}
