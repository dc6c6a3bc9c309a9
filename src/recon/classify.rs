use chrono::{Datelike, Duration, NaiveDate};
use log::{info, warn};
use std::collections::HashMap;

use super::calendar::with_year_offset;
use super::dimensions::assign_axes;
use super::error::ReconError;
use super::model::{Context, EnrichedFact, MatchedCategory, ParsedFiling, PeriodKind};
use crate::core::metrics::RunMetrics;
use crate::edgar::report::ReportType;

/// Inline XBRL is not reliably present in filings before this year; older
/// selections are rejected outright.
pub const INLINE_XBRL_FLOOR_YEAR: i32 = 2019;

/// The anchor dates one filing is classified against: its own period, the
/// fiscal-year boundaries derived from the 10-K chain, and the equivalent
/// prior-year period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
    pub doc_start: NaiveDate,
    pub doc_end: NaiveDate,
    pub fiscal_year_start: NaiveDate,
    pub prior_fiscal_year_start: NaiveDate,
    pub prior_fiscal_year_end: NaiveDate,
    pub prior_start: NaiveDate,
    pub prior_end: NaiveDate,
    /// True when any anchor came from a year-subtraction or midpoint
    /// estimate instead of an actual filing date.
    pub estimated: bool,
}

fn sorted_period_ends_desc(filings: &[&ParsedFiling]) -> Vec<NaiveDate> {
    let mut ends: Vec<NaiveDate> = filings.iter().map(|f| f.document_period_end).collect();
    ends.sort_unstable();
    ends.reverse();
    ends
}

/// Derive the four anchor-date pairs for one filing from the company's
/// filing history. Prior 10-K period ends define the fiscal-year starts;
/// the nearest earlier filing defines a 10-Q's own period start; the
/// same-quarter prior-year 10-Q defines the year-over-year window. Every
/// gap falls back to a calendar estimate and marks the result estimated.
pub fn derive_anchors(
    filing: &ParsedFiling,
    quarterlies: &[ParsedFiling],
    annuals: &[ParsedFiling],
    metrics: &mut RunMetrics,
) -> Result<Anchors, ReconError> {
    let doc_end = filing.document_period_end;
    if doc_end.year() < INLINE_XBRL_FLOOR_YEAR {
        return Err(ReconError::PreInlineXbrl(doc_end));
    }

    let mut estimated = false;
    let annual_ends = sorted_period_ends_desc(&annuals.iter().collect::<Vec<_>>());

    // Fiscal year start comes from the previous 10-K's period end.
    let prior_fiscal_year_end = match annual_ends.iter().find(|e| **e < doc_end) {
        Some(end) => *end,
        None => {
            warn!("no prior 10-K found before {} — using year-adjusted fallback", doc_end);
            estimated = true;
            with_year_offset(doc_end, -1)
        }
    };
    let fiscal_year_start = prior_fiscal_year_end + Duration::days(1);

    // And the prior fiscal year start from the 10-K before that one.
    let prior_fiscal_year_start = match annual_ends.iter().find(|e| **e < prior_fiscal_year_end) {
        Some(end) => *end + Duration::days(1),
        None => {
            warn!("no second prior 10-K found — using fallback year subtraction");
            estimated = true;
            with_year_offset(fiscal_year_start, -1)
        }
    };

    let (doc_start, prior_start, prior_end) = if filing.meta.form == ReportType::Form10K {
        (fiscal_year_start, prior_fiscal_year_start, prior_fiscal_year_end)
    } else {
        let all: Vec<&ParsedFiling> = quarterlies.iter().chain(annuals.iter()).collect();
        let all_ends = sorted_period_ends_desc(&all);

        let doc_start = match all_ends.iter().find(|e| **e < doc_end) {
            Some(end) => *end + Duration::days(1),
            None => {
                // No earlier filing at all: assume a roughly quarterly
                // period beginning at a month boundary.
                estimated = true;
                (doc_end - Duration::days(90)).with_day(1).expect("day 1 always valid")
            }
        };

        let prior_end = filing.meta.quarter.and_then(|quarter| {
            let prior_year = filing.meta.calendar_year.map(|y| y - 1);
            quarterlies
                .iter()
                .find(|q| q.meta.quarter == Some(quarter) && q.meta.calendar_year == prior_year)
                .map(|q| q.document_period_end)
        });
        let prior_start = prior_end.and_then(|pe| {
            all_ends.iter().find(|e| **e < pe).map(|end| *end + Duration::days(1))
        });

        match (prior_start, prior_end) {
            (Some(start), Some(end)) => (doc_start, start, end),
            _ => {
                warn!("prior period bounds missing — applying year-over-year fallback");
                estimated = true;
                (doc_start, with_year_offset(doc_start, -1), with_year_offset(doc_end, -1))
            }
        }
    };

    if estimated {
        metrics.record_flag("anchor_estimates_used", true);
    }
    info!(
        "current period {} to {} (fiscal year start {}); prior period {} to {} (prior fiscal year start {})",
        doc_start, doc_end, fiscal_year_start, prior_start, prior_end, prior_fiscal_year_start
    );

    Ok(Anchors {
        doc_start,
        doc_end,
        fiscal_year_start,
        prior_fiscal_year_start,
        prior_fiscal_year_end,
        prior_start,
        prior_end,
        estimated,
    })
}

fn categorize(period: &PeriodKind, is_annual: bool, anchors: &Anchors) -> Option<MatchedCategory> {
    match *period {
        PeriodKind::Duration { start, end } => {
            if is_annual {
                if start == anchors.fiscal_year_start && end == anchors.doc_end {
                    Some(MatchedCategory::CurrentFullYear)
                } else if start == anchors.prior_fiscal_year_start
                    && end == anchors.prior_fiscal_year_end
                {
                    Some(MatchedCategory::PriorFullYear)
                } else {
                    None
                }
            } else if start == anchors.doc_start && end == anchors.doc_end {
                Some(MatchedCategory::CurrentQ)
            } else if start == anchors.fiscal_year_start && end == anchors.doc_end {
                Some(MatchedCategory::CurrentYtd)
            } else if start == anchors.prior_start && end == anchors.prior_end {
                Some(MatchedCategory::PriorQ)
            } else if start == anchors.prior_fiscal_year_start && end == anchors.prior_end {
                Some(MatchedCategory::PriorYtd)
            } else {
                None
            }
        }
        PeriodKind::Instant(date) => {
            if date == anchors.doc_end {
                Some(MatchedCategory::CurrentQ)
            } else if date == anchors.prior_end {
                Some(MatchedCategory::PriorQ)
            } else {
                None
            }
        }
    }
}

fn presentation_role(filing: &ParsedFiling, tag: &str) -> Option<String> {
    let roles = filing.concept_roles.get(tag)?;
    let mut normalized: Vec<String> = roles.iter().map(|r| r.to_lowercase()).collect();
    normalized.sort();
    normalized.dedup();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.join("|"))
    }
}

/// Join every fact to its resolved context and assign a period category.
/// Facts matching no anchor keep a None category: excluded from matching
/// but retained for the missing-tag audits.
pub fn classify_facts(
    filing: &ParsedFiling,
    contexts: &HashMap<String, Context>,
    anchors: &Anchors,
) -> Vec<EnrichedFact> {
    let is_annual = filing.meta.form == ReportType::Form10K;
    let mut enriched = Vec::new();

    for fact in &filing.facts {
        let context = match contexts.get(&fact.context_ref) {
            Some(ctx) => ctx,
            None => continue,
        };
        let matched_category = categorize(&context.period, is_annual, anchors);
        enriched.push(EnrichedFact {
            tag: fact.tag.clone(),
            value: fact.value,
            context_ref: fact.context_ref.clone(),
            period: context.period,
            matched_category,
            date_type: matched_category.map(MatchedCategory::date_type),
            presentation_role: presentation_role(filing, &fact.tag),
            axes: assign_axes(&context.dimensions),
        });
    }

    info!(
        "{} facts extracted and enriched for {}",
        enriched.len(),
        filing.meta.display_label()
    );
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::model::{FilingMeta, Quarter, RawFact};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quarterly_anchors() -> Anchors {
        Anchors {
            doc_start: date(2024, 4, 1),
            doc_end: date(2024, 6, 30),
            fiscal_year_start: date(2024, 1, 1),
            prior_fiscal_year_start: date(2023, 1, 1),
            prior_fiscal_year_end: date(2023, 12, 31),
            prior_start: date(2023, 4, 1),
            prior_end: date(2023, 6, 30),
            estimated: false,
        }
    }

    fn filing(form: ReportType, end: NaiveDate) -> ParsedFiling {
        let mut meta = FilingMeta::new(form, "0000000000-24-000001", Some(end));
        meta.quarter = Some(Quarter::Q2);
        meta.calendar_year = Some(end.year());
        ParsedFiling {
            meta,
            document_period_end: end,
            facts: Vec::new(),
            context_blocks: HashMap::new(),
            concept_roles: HashMap::new(),
        }
    }

    #[test]
    fn quarterly_duration_categories() {
        let anchors = quarterly_anchors();
        let cases = [
            (date(2024, 4, 1), date(2024, 6, 30), Some(MatchedCategory::CurrentQ)),
            (date(2024, 1, 1), date(2024, 6, 30), Some(MatchedCategory::CurrentYtd)),
            (date(2023, 4, 1), date(2023, 6, 30), Some(MatchedCategory::PriorQ)),
            (date(2023, 1, 1), date(2023, 6, 30), Some(MatchedCategory::PriorYtd)),
            (date(2024, 2, 1), date(2024, 6, 30), None),
        ];
        for (start, end, expected) in cases {
            let period = PeriodKind::Duration { start, end };
            assert_eq!(categorize(&period, false, &anchors), expected, "{start}..{end}");
        }
    }

    #[test]
    fn annual_duration_categories() {
        let anchors = Anchors {
            doc_start: date(2024, 1, 1),
            doc_end: date(2024, 12, 31),
            fiscal_year_start: date(2024, 1, 1),
            prior_fiscal_year_start: date(2023, 1, 1),
            prior_fiscal_year_end: date(2023, 12, 31),
            prior_start: date(2023, 1, 1),
            prior_end: date(2023, 12, 31),
            estimated: false,
        };
        let current = PeriodKind::Duration { start: date(2024, 1, 1), end: date(2024, 12, 31) };
        let prior = PeriodKind::Duration { start: date(2023, 1, 1), end: date(2023, 12, 31) };
        assert_eq!(categorize(&current, true, &anchors), Some(MatchedCategory::CurrentFullYear));
        assert_eq!(categorize(&prior, true, &anchors), Some(MatchedCategory::PriorFullYear));
    }

    #[test]
    fn instant_categories() {
        let anchors = quarterly_anchors();
        assert_eq!(
            categorize(&PeriodKind::Instant(date(2024, 6, 30)), false, &anchors),
            Some(MatchedCategory::CurrentQ)
        );
        assert_eq!(
            categorize(&PeriodKind::Instant(date(2023, 6, 30)), false, &anchors),
            Some(MatchedCategory::PriorQ)
        );
        assert_eq!(categorize(&PeriodKind::Instant(date(2022, 12, 31)), false, &anchors), None);
    }

    #[test]
    fn classification_is_idempotent() {
        let anchors = quarterly_anchors();
        let mut f = filing(ReportType::Form10Q, date(2024, 6, 30));
        f.facts.push(RawFact {
            tag: "us-gaap:Revenues".to_string(),
            context_ref: "c1".to_string(),
            value: 1000.0,
            text: "1,000".to_string(),
        });
        let mut contexts = HashMap::new();
        contexts.insert(
            "c1".to_string(),
            Context {
                id: "c1".to_string(),
                period: PeriodKind::Duration { start: date(2024, 4, 1), end: date(2024, 6, 30) },
                dimensions: Vec::new(),
            },
        );

        let first = classify_facts(&f, &contexts, &anchors);
        let second = classify_facts(&f, &contexts, &anchors);
        assert_eq!(first, second);
        assert_eq!(first[0].matched_category, Some(MatchedCategory::CurrentQ));
        assert_eq!(first[0].date_type, Some(crate::recon::model::DateType::Q));
    }

    #[test]
    fn pre_2019_filing_is_rejected() {
        let f = filing(ReportType::Form10Q, date(2018, 6, 30));
        let mut metrics = RunMetrics::new();
        let err = derive_anchors(&f, &[], &[], &mut metrics);
        assert!(matches!(err, Err(ReconError::PreInlineXbrl(_))));
    }

    #[test]
    fn anchors_fall_back_when_history_is_thin() {
        // A lone 10-Q with no prior filings: every anchor is an estimate.
        let f = filing(ReportType::Form10Q, date(2024, 6, 30));
        let mut metrics = RunMetrics::new();
        let anchors = derive_anchors(&f, &[f.clone()], &[], &mut metrics).unwrap();
        assert!(anchors.estimated);
        assert_eq!(anchors.prior_fiscal_year_end, date(2023, 6, 30));
        assert_eq!(anchors.fiscal_year_start, date(2023, 7, 1));
        // ~90 days back, clamped to the start of the month.
        assert_eq!(anchors.doc_start, date(2024, 4, 1));
        assert_eq!(anchors.prior_end, date(2023, 6, 30));
    }

    #[test]
    fn anchors_use_real_filing_chain_when_present() {
        let current = filing(ReportType::Form10Q, date(2024, 6, 30));
        let mut q1 = filing(ReportType::Form10Q, date(2024, 3, 31));
        q1.meta.quarter = Some(Quarter::Q1);
        let mut prior_q2 = filing(ReportType::Form10Q, date(2023, 6, 30));
        prior_q2.meta.calendar_year = Some(2023);
        let mut prior_q1 = filing(ReportType::Form10Q, date(2023, 3, 31));
        prior_q1.meta.quarter = Some(Quarter::Q1);
        let k_2023 = filing(ReportType::Form10K, date(2023, 12, 31));
        let k_2022 = filing(ReportType::Form10K, date(2022, 12, 31));

        let quarterlies = vec![current.clone(), q1, prior_q2, prior_q1];
        let annuals = vec![k_2023, k_2022];
        let mut metrics = RunMetrics::new();
        let anchors = derive_anchors(&current, &quarterlies, &annuals, &mut metrics).unwrap();

        assert!(!anchors.estimated);
        assert_eq!(anchors.fiscal_year_start, date(2024, 1, 1));
        assert_eq!(anchors.prior_fiscal_year_start, date(2023, 1, 1));
        assert_eq!(anchors.doc_start, date(2024, 4, 1));
        assert_eq!(anchors.prior_start, date(2023, 4, 1));
        assert_eq!(anchors.prior_end, date(2023, 6, 30));
    }
}
