use chrono::{Datelike, NaiveDate};
use log::{info, warn};

use super::error::ReconError;
use super::model::{FilingMeta, Quarter};

/// Day-count windows between a 10-Q period end and its fiscal year-end.
/// Ordered nearest-to-FYE first; the windows are disjoint, so a gap between
/// them means a non-standard stub period rather than an ambiguous read.
const QUARTER_WINDOWS: [(Quarter, i64, i64); 3] = [
    (Quarter::Q3, 70, 120),
    (Quarter::Q2, 160, 200),
    (Quarter::Q1, 250, 300),
];

/// Assign a quarter from the day difference to the matched fiscal year-end,
/// or None when the difference falls inside no window.
pub fn quarter_for_day_diff(days: i64) -> Option<Quarter> {
    QUARTER_WINDOWS
        .iter()
        .find(|(_, lo, hi)| (*lo..=*hi).contains(&days))
        .map(|(q, _, _)| *q)
}

/// Shift a date by whole years, clamping Feb 29 to Feb 28 off leap years.
pub fn with_year_offset(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1).expect("valid clamped date"))
}

/// Candidate fiscal year-ends: every 10-K period end, newest first.
/// A company with no dated 10-K has no derivable fiscal calendar at all.
pub fn fiscal_year_ends(annuals: &[FilingMeta]) -> Result<Vec<NaiveDate>, ReconError> {
    let mut ends: Vec<NaiveDate> = annuals.iter().filter_map(|k| k.report_date).collect();
    ends.sort_unstable();
    ends.reverse();
    if ends.is_empty() {
        return Err(ReconError::NoFiscalCalendar);
    }
    Ok(ends)
}

/// Pick the fiscal year-end a 10-Q period end belongs to: the smallest FYE
/// on or after the period end. When the quarter post-dates every known 10-K
/// (newly public company, or the next 10-K is not filed yet), reuse the
/// latest known FYE shifted forward one year.
pub fn match_fiscal_year_end(ends: &[NaiveDate], q_date: NaiveDate) -> Option<(NaiveDate, bool)> {
    if let Some(fye) = ends.iter().filter(|fy| **fy >= q_date).min() {
        return Some((*fye, false));
    }
    ends.iter()
        .filter(|fy| **fy < q_date)
        .max()
        .map(|fye| (with_year_offset(*fye, 1), true))
}

/// Build the quarter display label, e.g. Q2 matched to FYE 2024-12-31
/// becomes "2Q24".
fn quarter_label(quarter: Quarter, fye: NaiveDate) -> String {
    format!("{}Q{:02}", quarter.number(), fye.year() % 100)
}

/// Label every 10-Q with its fiscal year-end, quarter and display label.
/// Entries whose day distance to the matched FYE lands in no window are
/// flagged non-standard and left unlabeled so nothing downstream matches
/// against them.
pub fn label_quarterlies(mut quarterlies: Vec<FilingMeta>, ends: &[NaiveDate]) -> Vec<FilingMeta> {
    for q in &mut quarterlies {
        let q_date = match q.report_date {
            Some(d) => d,
            None => continue,
        };

        let (matched_fy, shifted) = match match_fiscal_year_end(ends, q_date) {
            Some(hit) => hit,
            None => {
                warn!("no matching fiscal year-end for 10-Q ending {}", q_date);
                continue;
            }
        };
        if shifted {
            info!(
                "10-Q ending {} post-dates every known 10-K; using shifted fiscal year-end {}",
                q_date, matched_fy
            );
        }

        let days_diff = (matched_fy - q_date).num_days();
        let quarter = match quarter_for_day_diff(days_diff) {
            Some(quarter) => quarter,
            None => {
                warn!(
                    "unexpected delta ({} days) between {} and {} — nonstandard quarter",
                    days_diff, matched_fy, q_date
                );
                q.non_standard_period = true;
                continue;
            }
        };

        q.fiscal_year_end = Some(matched_fy);
        q.fiscal_year = Some(matched_fy.year());
        q.quarter = Some(quarter);
        q.calendar_year = Some(q_date.year());
        q.label = Some(quarter_label(quarter, matched_fy));
        info!("{} -> {} (matched FY end {})", q_date, q.label.as_deref().unwrap(), matched_fy);
    }
    quarterlies
}

/// Label every 10-K with its fiscal year and fiscal year-end, both read off
/// the period end date.
pub fn label_annuals(mut annuals: Vec<FilingMeta>) -> Vec<FilingMeta> {
    for k in &mut annuals {
        match k.report_date {
            Some(d) => {
                k.fiscal_year = Some(d.year());
                k.fiscal_year_end = Some(d);
                k.calendar_year = Some(d.year());
                k.label = Some(format!("FY{:02}", d.year() % 100));
            }
            None => {
                warn!("could not parse period end for accession {}", k.accession);
            }
        }
    }
    annuals
}

/// Resolve the whole fiscal calendar: derive candidate year-ends from the
/// 10-Ks, then label both filing lists. Must run before period
/// classification: YTD/FY anchor dates depend on the year-end chain
/// derived here.
pub fn label_filings(
    quarterlies: Vec<FilingMeta>,
    annuals: Vec<FilingMeta>,
) -> Result<(Vec<FilingMeta>, Vec<FilingMeta>), ReconError> {
    let ends = fiscal_year_ends(&annuals)?;
    let quarterlies = label_quarterlies(quarterlies, &ends);
    let annuals = label_annuals(annuals);
    Ok((quarterlies, annuals))
}
