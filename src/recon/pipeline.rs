use chrono::Datelike;
use itertools::Itertools;
use log::{info, warn};
use serde_json::json;

use super::audit::{flag_value_collisions, missing_tags, missing_tags_by_role, new_disclosures};
use super::calendar;
use super::classify::{classify_facts, derive_anchors, INLINE_XBRL_FLOOR_YEAR};
use super::dimensions::resolve_contexts;
use super::error::ReconError;
use super::fourth_quarter;
use super::matcher::{
    annual_instant_keys, dedup_by_value_pair, dedup_exact, flow_keys, fuzzy_pair, instant_keys,
    match_stage, rescue_keys, zip_match, MatchSettings, NearMiss, ANNUAL_INSTANT_MIN_KEYS,
    FLOW_MIN_KEYS, INSTANT_MIN_KEYS,
};
use super::model::{
    EnrichedFact, FilingMeta, MatchedCategory, MatchedRow, ParsedFiling, PeriodKind, Quarter,
};
use super::sign::apply_visual_signs;
use crate::core::metrics::RunMetrics;
use crate::core::types::{Advisories, FactSource, RunReport, TargetSummary};
use crate::edgar::report::ReportType;
use crate::edgar::tickers::Ticker;

/// One reconciliation request: a company, a fiscal year, and a quarter.
/// Quarter 4 switches to the implied-fourth-quarter workflow; `full_year`
/// (only meaningful with quarter 4) reconciles the full year instead of the
/// derived quarter.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub ticker: Ticker,
    pub year: i32,
    pub quarter: u8,
    pub full_year: bool,
}

fn quarter_label(quarter: u8, year: i32) -> String {
    format!("{}Q{:02}", quarter, year % 100)
}

fn annual_label(year: i32) -> String {
    format!("FY{:02}", year % 100)
}

/// Which (quarter, fiscal year) 10-Qs a workflow needs. The 4Q build pulls
/// the Q2/Q3 filings of both years; a normal build pulls the target
/// quarter, its neighbor, and their prior-year counterparts. A "previous
/// quarter" of Q1 has no 10-Q, so nothing is requested for it.
fn quarterly_targets(year: i32, quarter: u8) -> Vec<(Quarter, i32)> {
    let mut targets = Vec::new();
    if quarter == 4 {
        for q in [Quarter::Q3, Quarter::Q2] {
            targets.push((q, year));
            targets.push((q, year - 1));
        }
    } else {
        if let Some(q) = Quarter::from_number(quarter) {
            targets.push((q, year));
            targets.push((q, year - 1));
        }
        if let Some(prev) = Quarter::from_number(quarter.saturating_sub(1)) {
            targets.push((prev, year));
            targets.push((prev, year - 1));
        }
    }
    targets
}

fn annual_years(year: i32, quarter: u8) -> Vec<i32> {
    if quarter == 4 {
        vec![year, year - 1, year - 2]
    } else {
        vec![year - 1, year - 2]
    }
}

fn select_quarterlies(metas: &[FilingMeta], targets: &[(Quarter, i32)]) -> Vec<FilingMeta> {
    metas
        .iter()
        .filter(|m| {
            m.quarter
                .zip(m.fiscal_year_end)
                .map(|(q, fye)| targets.contains(&(q, fye.year())))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn select_annuals(metas: &[FilingMeta], years: &[i32]) -> Vec<FilingMeta> {
    metas
        .iter()
        .filter(|m| m.fiscal_year.map(|y| years.contains(&y)).unwrap_or(false))
        .cloned()
        .collect()
}

async fn load_batch<S: FactSource + Sync>(
    source: &S,
    metas: &[FilingMeta],
) -> Vec<ParsedFiling> {
    let mut parsed = Vec::new();
    for meta in metas {
        if let Some(date) = meta.report_date {
            if date.year() < INLINE_XBRL_FLOOR_YEAR {
                info!("skipping {} — pre-{} filing", meta.accession, INLINE_XBRL_FLOOR_YEAR);
                continue;
            }
        }
        match source.load(meta).await {
            Ok(filing) => parsed.push(filing),
            Err(e) => warn!("skipping {}: {}", meta.accession, e),
        }
    }
    parsed
}

/// Relabel parsed filings from the authoritative in-document period end.
/// The pre-download labels came from feed metadata, which in fallback mode
/// is only a filing date.
fn relabel_parsed(
    mut quarterly: Vec<ParsedFiling>,
    mut annual: Vec<ParsedFiling>,
) -> Result<(Vec<ParsedFiling>, Vec<ParsedFiling>), ReconError> {
    let stamp = |p: &ParsedFiling| {
        let mut meta = p.meta.clone();
        meta.report_date = Some(p.document_period_end);
        meta
    };
    let q_metas: Vec<FilingMeta> = quarterly.iter().map(stamp).collect();
    let k_metas: Vec<FilingMeta> = annual.iter().map(stamp).collect();
    let (q_labeled, k_labeled) = calendar::label_filings(q_metas, k_metas)?;
    for (p, meta) in quarterly.iter_mut().zip(q_labeled) {
        p.meta = meta;
    }
    for (p, meta) in annual.iter_mut().zip(k_labeled) {
        p.meta = meta;
    }
    Ok((quarterly, annual))
}

fn enrich(
    filing: &ParsedFiling,
    quarterly: &[ParsedFiling],
    annual: &[ParsedFiling],
    metrics: &mut RunMetrics,
) -> Result<Vec<EnrichedFact>, ReconError> {
    info!(
        "starting enrichment for {} [{}] | period end {} | accession {}",
        filing.meta.form,
        filing.meta.display_label(),
        filing.document_period_end,
        filing.meta.accession
    );
    let anchors = derive_anchors(filing, quarterly, annual, metrics)?;
    let contexts = resolve_contexts(&filing.context_blocks);
    Ok(classify_facts(filing, &contexts, &anchors))
}

fn by_category(facts: &[EnrichedFact], categories: &[MatchedCategory]) -> Vec<EnrichedFact> {
    facts
        .iter()
        .filter(|f| f.matched_category.map(|c| categories.contains(&c)).unwrap_or(false))
        .cloned()
        .collect()
}

fn instants_only(facts: Vec<EnrichedFact>) -> Vec<EnrichedFact> {
    facts.into_iter().filter(|f| f.is_instant()).collect()
}

fn shift_instant_dates(facts: &[EnrichedFact], days: i64) -> Vec<EnrichedFact> {
    facts
        .iter()
        .cloned()
        .map(|mut f| {
            if let PeriodKind::Instant(date) = f.period {
                f.period = PeriodKind::Instant(date + chrono::Duration::days(days));
            }
            f
        })
        .collect()
}

fn category_counts(facts: &[EnrichedFact]) -> serde_json::Value {
    let mut counts = std::collections::BTreeMap::new();
    for fact in facts {
        let key = match fact.matched_category {
            Some(c) => format!("{:?}", c),
            None => "uncategorized".to_string(),
        };
        *counts.entry(key).or_insert(0usize) += 1;
    }
    json!(counts)
}

fn finalize(
    mut rows: Vec<MatchedRow>,
    negated: &std::collections::HashSet<String>,
    metrics: &mut RunMetrics,
) -> Vec<MatchedRow> {
    let (flipped_current, flipped_prior) = apply_visual_signs(&mut rows, negated);
    metrics.record(
        "sign_flip_count",
        json!({ "current": flipped_current, "prior": flipped_prior }),
    );

    rows.sort_by(|a, b| {
        let role_a = a.presentation_role.clone().unwrap_or_default();
        let role_b = b.presentation_role.clone().unwrap_or_default();
        role_a.cmp(&role_b).then_with(|| a.tag.cmp(&b.tag))
    });
    dedup_by_value_pair(rows)
}

/// Run one reconciliation to completion: fetch, label, classify, match,
/// synthesize, audit, and sign-normalize. Synchronous from the first
/// classification on; the only awaits are the network loads up front.
pub async fn run<S: FactSource + Sync>(
    source: &S,
    request: &RunRequest,
    settings: &MatchSettings,
) -> Result<RunReport, ReconError> {
    if !(1..=4).contains(&request.quarter) {
        return Err(ReconError::InvalidQuarter(request.quarter));
    }
    let four_q = request.quarter == 4;
    // Full-year reconciliation only makes sense on top of an annual build.
    let full_year = request.full_year && four_q;

    let started = std::time::Instant::now();
    let mut metrics = RunMetrics::new();
    metrics.record("ticker", json!(request.ticker.as_str()));
    metrics.record("year", json!(request.year));
    metrics.record("quarter", json!(request.quarter));
    metrics.record("full_year_mode", json!(full_year));

    // Discovery + labeling from feed metadata, to know what to download.
    let filing_set = source.filings(&request.ticker, request.year).await?;
    metrics.record_flag("fallback_triggered", filing_set.used_fallback);
    let (q_metas, k_metas) =
        calendar::label_filings(filing_set.quarterly, filing_set.annual)?;

    // In fallback mode the feed dates are filing dates, so pre-selection
    // would be unreliable; download the whole window instead.
    let (need_q, need_k) = if filing_set.used_fallback {
        (q_metas.clone(), k_metas.clone())
    } else {
        (
            select_quarterlies(&q_metas, &quarterly_targets(request.year, request.quarter)),
            select_annuals(&k_metas, &annual_years(request.year, request.quarter)),
        )
    };
    info!(
        "selected {} 10-Q and {} 10-K filings for processing",
        need_q.len(),
        need_k.len()
    );

    let parsed_q = load_batch(source, &need_q).await;
    let parsed_k = load_batch(source, &need_k).await;
    let (parsed_q, parsed_k) = relabel_parsed(parsed_q, parsed_k)?;

    let report = if four_q {
        run_fourth_quarter(source, request, full_year, settings, &parsed_q, &parsed_k, &mut metrics)
            .await?
    } else {
        run_quarterly(source, request, settings, &parsed_q, &parsed_k, &mut metrics).await?
    };

    let mut report = report;
    report
        .metrics
        .record("total_processing_seconds", json!(started.elapsed().as_secs_f64()));
    Ok(report)
}

async fn run_quarterly<S: FactSource + Sync>(
    source: &S,
    request: &RunRequest,
    settings: &MatchSettings,
    parsed_q: &[ParsedFiling],
    parsed_k: &[ParsedFiling],
    metrics: &mut RunMetrics,
) -> Result<RunReport, ReconError> {
    let target_label = quarter_label(request.quarter, request.year);
    info!("target label: {}", target_label);

    let target = parsed_q
        .iter()
        .find(|p| p.meta.label.as_deref() == Some(target_label.as_str()))
        .ok_or_else(|| ReconError::MissingFiling {
            form: ReportType::Form10Q.to_string(),
            label: target_label.clone(),
        })?;

    // The prior-year comparison filing: same quarter, previous fiscal
    // year-end in the observed chain. Without it there is no meaningful
    // year-over-year output at all.
    let mut fiscal_ends: Vec<chrono::NaiveDate> = parsed_q
        .iter()
        .filter_map(|p| p.meta.fiscal_year_end)
        .sorted()
        .dedup()
        .collect();
    fiscal_ends.reverse();
    let target_fye = target.meta.fiscal_year_end;
    let prior_fye = fiscal_ends
        .iter()
        .skip_while(|fye| Some(**fye) != target_fye)
        .nth(1)
        .copied();
    let prior = prior_fye
        .and_then(|fye| {
            parsed_q.iter().find(|p| {
                p.meta.quarter == target.meta.quarter && p.meta.fiscal_year_end == Some(fye)
            })
        })
        .ok_or_else(|| ReconError::MissingPriorFiling {
            label: target_label.clone(),
        })?;
    info!(
        "found prior 10-Q {} | period end {}",
        prior.meta.display_label(),
        prior.document_period_end
    );

    let negated = source.negated_concepts(&target.meta).await?;
    metrics.record_count("negated_labels_extracted", negated.len());

    let current_facts = enrich(target, parsed_q, parsed_k, metrics)?;
    let prior_facts = enrich(prior, parsed_q, parsed_k, metrics)?;
    metrics.record("fact_category_counts", category_counts(&current_facts));

    // Stage 1: current vs prior periods reported inside the target filing.
    let curr_flow = by_category(
        &current_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    );
    let prior_in_filing = by_category(
        &current_facts,
        &[MatchedCategory::PriorQ, MatchedCategory::PriorYtd],
    );
    let mut rows = match_stage(
        &curr_flow,
        &prior_in_filing,
        flow_keys(),
        FLOW_MIN_KEYS,
        settings,
        metrics,
    );
    metrics.record_rate(
        "match_rate",
        "quarterly",
        rows.len() as f64 / curr_flow.len().max(1) as f64,
    );

    // Stage 2: YTD facts against the prior-year filing, which reports the
    // comparable cumulative period as its own current YTD.
    let ytd_curr = by_category(&current_facts, &[MatchedCategory::CurrentYtd]);
    let ytd_prior = by_category(&prior_facts, &[MatchedCategory::CurrentYtd]);
    let ytd_rows = match_stage(&ytd_curr, &ytd_prior, flow_keys(), FLOW_MIN_KEYS, settings, metrics);
    metrics.record_rate(
        "match_rate",
        "ytd",
        ytd_rows.len() as f64 / ytd_curr.len().max(1) as f64,
    );

    // Stage 3: balance-sheet instants against the prior filing, with prior
    // dates shifted forward by the exact day gap between the two period
    // ends so the end-date key lines up.
    let inst_curr = instants_only(by_category(&current_facts, &[MatchedCategory::CurrentQ]));
    let inst_prior = instants_only(by_category(&prior_facts, &[MatchedCategory::CurrentQ]));
    let year_delta = (target.document_period_end - prior.document_period_end).num_days();
    let inst_prior = shift_instant_dates(&inst_prior, year_delta);
    let inst_rows = match_stage(
        &inst_curr,
        &inst_prior,
        instant_keys(),
        INSTANT_MIN_KEYS,
        settings,
        metrics,
    );
    metrics.record_rate(
        "match_rate",
        "instants",
        inst_rows.len() as f64 / inst_curr.len().max(1) as f64,
    );

    rows.extend(ytd_rows);
    rows.extend(inst_rows);
    rows.retain(|r| r.current_value.is_some() && r.prior_value.is_some());
    rows = dedup_exact(rows);

    // Stage 4: rescue pass over tags that fell through, on looser keys and
    // with prior instants date-shifted the same way. Rescued rows whose
    // prior value already appears in the main output are discarded; a
    // shared prior value across the two passes is exactly the ambiguity
    // the collision audit exists to catch.
    let missing = missing_tags(&current_facts, &rows, false);
    let rescue_curr: Vec<EnrichedFact> = by_category(
        &current_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    )
    .into_iter()
    .filter(|f| missing.contains(&f.tag))
    .collect();
    let rescue_prior: Vec<EnrichedFact> = by_category(
        &prior_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    )
    .into_iter()
    .filter(|f| missing.contains(&f.tag))
    .collect();
    let fye_delta = target
        .meta
        .fiscal_year_end
        .zip(prior.meta.fiscal_year_end)
        .map(|(c, p)| (c - p).num_days())
        .unwrap_or(year_delta);
    let rescue_prior: Vec<EnrichedFact> = rescue_prior
        .iter()
        .cloned()
        .map(|mut f| {
            if let PeriodKind::Instant(date) = f.period {
                f.period = PeriodKind::Instant(date + chrono::Duration::days(fye_delta));
            }
            f
        })
        .collect();

    let mut rescue_rows = zip_match(&rescue_curr, &rescue_prior, &rescue_keys());
    rescue_rows.retain(|r| r.current_value.is_some() || r.prior_value.is_some());
    rescue_rows = dedup_exact(rescue_rows);
    flag_value_collisions(&mut rescue_rows);
    metrics.record_rate(
        "match_rate",
        "rescue",
        rescue_rows.len() as f64 / rescue_curr.len().max(1) as f64,
    );

    let main_priors: std::collections::HashSet<u64> =
        rows.iter().filter_map(|r| r.prior_value.map(f64::to_bits)).collect();
    let before = rescue_rows.len();
    rescue_rows.retain(|r| {
        r.prior_value.map(|v| !main_priors.contains(&v.to_bits())).unwrap_or(true)
    });
    if before > rescue_rows.len() {
        info!(
            "dropped {} rescued rows overlapping prior values in the main output",
            before - rescue_rows.len()
        );
    }
    rows.extend(rescue_rows);

    // Stage 5: string-similarity fallback for whatever is still unmatched.
    let still_missing = missing_tags(&current_facts, &rows, false);
    let fuzzy_curr: Vec<EnrichedFact> = by_category(
        &current_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    )
    .into_iter()
    .filter(|f| still_missing.contains(&f.tag))
    .collect();
    let fuzzy_prior = by_category(
        &prior_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    );
    let fuzzy = fuzzy_pair(&fuzzy_curr, &fuzzy_prior, settings);
    metrics.record_count("fuzzy_matches_added", fuzzy.pairs.len());
    for (ci, pi) in &fuzzy.pairs {
        rows.push(MatchedRow::from_pair(&fuzzy_curr[*ci], &fuzzy_prior[*pi]));
    }
    let near_misses: Vec<NearMiss> = fuzzy.near_misses;

    rows = dedup_exact(rows);
    let collision_rows = flag_value_collisions(&mut rows);
    metrics.record_rate(
        "collision_rate",
        "final",
        collision_rows as f64 / rows.len().max(1) as f64,
    );

    let final_missing = missing_tags(&current_facts, &rows, false);
    let missing_by_role = missing_tags_by_role(&current_facts, &final_missing);
    let new_count = new_disclosures(&rows, &prior_facts);

    let total_current = by_category(
        &current_facts,
        &[MatchedCategory::CurrentQ, MatchedCategory::CurrentYtd],
    )
    .len();
    let rows = finalize(rows, &negated, metrics);
    metrics.record(
        "final_match_rate",
        json!(rows.len() as f64 / total_current.max(1) as f64),
    );

    Ok(RunReport {
        target: TargetSummary {
            ticker: request.ticker.to_string(),
            year: request.year,
            quarter: request.quarter,
            full_year: false,
            label: target_label,
            form: target.meta.form.to_string(),
            accession: target.meta.accession.clone(),
            period_end: target.document_period_end,
        },
        rows,
        advisories: Advisories {
            missing_tags: final_missing,
            missing_by_role,
            near_misses,
            collision_rows,
            new_disclosures: new_count,
        },
        metrics: metrics.clone(),
    })
}

async fn run_fourth_quarter<S: FactSource + Sync>(
    source: &S,
    request: &RunRequest,
    full_year: bool,
    settings: &MatchSettings,
    parsed_q: &[ParsedFiling],
    parsed_k: &[ParsedFiling],
    metrics: &mut RunMetrics,
) -> Result<RunReport, ReconError> {
    let label = annual_label(request.year);
    info!("annual label: {}", label);

    let target_k = parsed_k
        .iter()
        .find(|p| p.meta.fiscal_year == Some(request.year))
        .ok_or_else(|| ReconError::MissingFiling {
            form: ReportType::Form10K.to_string(),
            label: label.clone(),
        })?;
    // The prior 10-K anchors the prior fiscal year; without it the prior
    // column of the derived quarter cannot exist.
    parsed_k
        .iter()
        .find(|p| p.meta.fiscal_year == Some(request.year - 1))
        .ok_or_else(|| ReconError::MissingPriorFiling {
            label: annual_label(request.year - 1),
        })?;

    let negated = source.negated_concepts(&target_k.meta).await?;
    metrics.record_count("negated_labels_extracted", negated.len());

    let k_facts = enrich(target_k, parsed_q, parsed_k, metrics)?;
    metrics.record("fact_category_counts", category_counts(&k_facts));

    // FY flows come straight out of the 10-K, which reports both years.
    let fy_curr = by_category(&k_facts, &[MatchedCategory::CurrentFullYear]);
    let fy_prior = by_category(&k_facts, &[MatchedCategory::PriorFullYear]);

    // Balance-sheet instants: fiscal year-end vs prior fiscal year-end,
    // matched directly since point-in-time balances need no subtraction.
    let inst_curr = instants_only(by_category(&k_facts, &[MatchedCategory::CurrentQ]));
    let inst_prior = instants_only(by_category(&k_facts, &[MatchedCategory::PriorQ]));
    let inst_rows = match_stage(
        &inst_curr,
        &inst_prior,
        annual_instant_keys(),
        ANNUAL_INSTANT_MIN_KEYS,
        settings,
        metrics,
    );
    metrics.record_rate(
        "match_rate",
        "instant",
        inst_rows.len() as f64 / inst_curr.len().max(1) as f64,
    );

    let (mut rows, near_misses) = if full_year {
        let fy_rows = match_stage(
            &fy_curr,
            &fy_prior,
            annual_instant_keys(),
            ANNUAL_INSTANT_MIN_KEYS,
            settings,
            metrics,
        );
        metrics.record_rate(
            "match_rate",
            "fy_final",
            fy_rows.len() as f64 / fy_curr.len().max(1) as f64,
        );
        let mut rows = fy_rows;
        rows.extend(inst_rows);
        rows.retain(|r| r.current_value.is_some() || r.prior_value.is_some());
        (dedup_exact(rows), Vec::new())
    } else {
        // The implied quarter needs the nine-month cumulative pairs, which
        // only the Q3 filing of the same fiscal year carries.
        let fye_target = target_k.meta.fiscal_year_end;
        let q3 = parsed_q
            .iter()
            .find(|p| {
                p.meta.quarter == Some(Quarter::Q3) && p.meta.fiscal_year_end == fye_target
            })
            .ok_or_else(|| ReconError::MissingFiling {
                form: ReportType::Form10Q.to_string(),
                label: format!("Q3 {}", label),
            })?;

        let fy_rows =
            match_stage(&fy_curr, &fy_prior, flow_keys(), FLOW_MIN_KEYS, settings, metrics);
        metrics.record_rate(
            "match_rate",
            "fy",
            fy_rows.len() as f64 / fy_curr.len().max(1) as f64,
        );

        let q3_facts = enrich(q3, parsed_q, parsed_k, metrics)?;
        let ytd_curr = by_category(&q3_facts, &[MatchedCategory::CurrentYtd]);
        let ytd_prior = by_category(&q3_facts, &[MatchedCategory::PriorYtd]);
        let ytd_rows =
            match_stage(&ytd_curr, &ytd_prior, flow_keys(), FLOW_MIN_KEYS, settings, metrics);
        metrics.record_rate(
            "match_rate",
            "ytd",
            ytd_rows.len() as f64 / ytd_curr.len().max(1) as f64,
        );

        let flows = fourth_quarter::derive_flows(fy_rows, ytd_rows, settings);
        metrics.record(
            "implied_q4",
            json!({ "exact": flows.exact_merged, "fuzzy": flows.fuzzy_merged }),
        );
        (fourth_quarter::combine(flows.rows, inst_rows), flows.near_misses)
    };

    let collision_rows = flag_value_collisions(&mut rows);
    metrics.record_rate(
        "collision_rate",
        "final",
        collision_rows as f64 / rows.len().max(1) as f64,
    );

    let final_missing = missing_tags(&k_facts, &rows, true);
    let missing_by_role = missing_tags_by_role(&k_facts, &final_missing);

    let total_facts = fy_curr.len() + inst_curr.len();
    let rows = finalize(rows, &negated, metrics);
    metrics.record(
        "final_match_rate",
        json!(rows.len() as f64 / total_facts.max(1) as f64),
    );

    Ok(RunReport {
        target: TargetSummary {
            ticker: request.ticker.to_string(),
            year: request.year,
            quarter: request.quarter,
            full_year,
            label,
            form: target_k.meta.form.to_string(),
            accession: target_k.meta.accession.clone(),
            period_end: target_k.document_period_end,
        },
        rows,
        advisories: Advisories {
            missing_tags: final_missing,
            missing_by_role,
            near_misses,
            collision_rows,
            new_disclosures: 0,
        },
        metrics: metrics.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterly_targets_cover_both_years() {
        let targets = quarterly_targets(2024, 2);
        assert!(targets.contains(&(Quarter::Q2, 2024)));
        assert!(targets.contains(&(Quarter::Q2, 2023)));
        assert!(targets.contains(&(Quarter::Q1, 2024)));
        assert!(targets.contains(&(Quarter::Q1, 2023)));
    }

    #[test]
    fn q1_requests_no_previous_quarter() {
        let targets = quarterly_targets(2024, 1);
        assert_eq!(targets, vec![(Quarter::Q1, 2024), (Quarter::Q1, 2023)]);
    }

    #[test]
    fn four_q_pulls_q2_and_q3_of_both_years() {
        let targets = quarterly_targets(2024, 4);
        assert_eq!(
            targets,
            vec![
                (Quarter::Q3, 2024),
                (Quarter::Q3, 2023),
                (Quarter::Q2, 2024),
                (Quarter::Q2, 2023),
            ]
        );
    }

    #[test]
    fn annual_window_depends_on_mode() {
        assert_eq!(annual_years(2024, 4), vec![2024, 2023, 2022]);
        assert_eq!(annual_years(2024, 2), vec![2023, 2022]);
    }
}
