use log::info;
use std::collections::HashMap;

use super::matcher::{dedup_exact, fuzzy_pair, MatchSettings, NearMiss};
use super::model::{AxisCategory, MatchedRow};

/// Result of the implied-fourth-quarter subtraction: derived flow rows plus
/// the audit trail of the fuzzy remainder pass.
#[derive(Debug, Default)]
pub struct FourthQuarterFlows {
    pub rows: Vec<MatchedRow>,
    pub near_misses: Vec<NearMiss>,
    pub exact_merged: usize,
    pub fuzzy_merged: usize,
}

fn merge_key(row: &MatchedRow) -> Vec<String> {
    let mut key = vec![row.tag.clone()];
    for category in AxisCategory::ALL {
        key.push(row.axes.key_component(category).to_string());
    }
    key
}

fn subtract(fy: &MatchedRow, ytd: &MatchedRow) -> MatchedRow {
    MatchedRow {
        tag: fy.tag.clone(),
        date_type: fy.date_type,
        axes: fy.axes.clone(),
        presentation_role: fy.presentation_role.clone(),
        current_start: fy.current_start,
        current_end: None,
        current_value: fy
            .current_value
            .zip(ytd.current_value)
            .map(|(full_year, nine_month)| full_year - nine_month),
        current_context: None,
        prior_start: fy.prior_start,
        prior_end: None,
        prior_value: fy
            .prior_value
            .zip(ytd.prior_value)
            .map(|(full_year, nine_month)| full_year - nine_month),
        prior_context: None,
        collision_flag: false,
        visual_current: None,
        visual_prior: None,
    }
}

/// Synthesize standalone fourth-quarter flow values that filers never
/// disclose directly: full-year minus nine-month cumulative, computed for
/// the current and prior columns independently. Inputs are the matched FY
/// pairs (from the 10-K) and the matched YTD pairs (from the Q3 10-Q),
/// joined on tag + axis tuple. Whatever the exact join misses goes through
/// the fuzzy axis-similarity pass. Instant facts never come through here;
/// point-in-time balances are matched directly, not subtracted.
pub fn derive_flows(
    fy_rows: Vec<MatchedRow>,
    ytd_rows: Vec<MatchedRow>,
    settings: &MatchSettings,
) -> FourthQuarterFlows {
    // Duplicate keys on either side would fan the join out; drop exact
    // duplicates first.
    let fy_rows = dedup_exact(fy_rows);
    let ytd_rows = dedup_exact(ytd_rows);

    let mut ytd_by_key: HashMap<Vec<String>, usize> = HashMap::new();
    for (i, row) in ytd_rows.iter().enumerate() {
        ytd_by_key.entry(merge_key(row)).or_insert(i);
    }

    let mut output = FourthQuarterFlows::default();
    let mut fy_unmatched = Vec::new();
    let mut used_ytd = vec![false; ytd_rows.len()];

    for fy in &fy_rows {
        match ytd_by_key.get(&merge_key(fy)) {
            Some(&ytd_index) => {
                used_ytd[ytd_index] = true;
                output.rows.push(subtract(fy, &ytd_rows[ytd_index]));
                output.exact_merged += 1;
            }
            None => fy_unmatched.push(fy.clone()),
        }
    }

    let ytd_unmatched: Vec<MatchedRow> = ytd_rows
        .iter()
        .enumerate()
        .filter(|(i, _)| !used_ytd[*i])
        .map(|(_, row)| row.clone())
        .collect();
    info!(
        "implied Q4 merge: {} exact, {} FY rows and {} YTD rows left for fuzzy pass",
        output.exact_merged,
        fy_unmatched.len(),
        ytd_unmatched.len()
    );

    let fuzzy = fuzzy_pair(&fy_unmatched, &ytd_unmatched, settings);
    for (fy_index, ytd_index) in &fuzzy.pairs {
        output.rows.push(subtract(&fy_unmatched[*fy_index], &ytd_unmatched[*ytd_index]));
        output.fuzzy_merged += 1;
    }
    output.near_misses = fuzzy.near_misses;

    output
}

/// Final assembly: derived flow rows plus directly-matched instants, rows
/// missing both values dropped, exact duplicates removed.
pub fn combine(flows: Vec<MatchedRow>, instants: Vec<MatchedRow>) -> Vec<MatchedRow> {
    let mut combined = flows;
    combined.extend(instants);
    combined.retain(|row| row.current_value.is_some() || row.prior_value.is_some());
    dedup_exact(combined)
}
