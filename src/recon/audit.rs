use log::info;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::model::{AxisCategory, EnrichedFact, MatchedRow};

/// Flag rows whose current or prior value participates in more than one
/// distinct pairing. A prior value matched to two different current values
/// (or vice versa) marks an ambiguous mapping, common with sparse, zero or
/// duplicated figures. Rows are never removed: a company can legitimately
/// report the same number on two line items, so the flag is advisory and
/// rides through to the report sink.
pub fn flag_value_collisions(rows: &mut [MatchedRow]) -> usize {
    let mut prior_to_current: HashMap<u64, HashSet<u64>> = HashMap::new();
    let mut current_to_prior: HashMap<u64, HashSet<u64>> = HashMap::new();

    for row in rows.iter() {
        if let (Some(current), Some(prior)) = (row.current_value, row.prior_value) {
            prior_to_current.entry(prior.to_bits()).or_default().insert(current.to_bits());
            current_to_prior.entry(current.to_bits()).or_default().insert(prior.to_bits());
        }
    }

    let bad_priors: HashSet<u64> = prior_to_current
        .iter()
        .filter(|(_, currents)| currents.len() > 1)
        .map(|(p, _)| *p)
        .collect();
    let bad_currents: HashSet<u64> = current_to_prior
        .iter()
        .filter(|(_, priors)| priors.len() > 1)
        .map(|(c, _)| *c)
        .collect();

    let mut flagged = 0;
    for row in rows.iter_mut() {
        let prior_hit = row.prior_value.map(|v| bad_priors.contains(&v.to_bits())).unwrap_or(false);
        let current_hit = row
            .current_value
            .map(|v| bad_currents.contains(&v.to_bits()))
            .unwrap_or(false);
        if prior_hit || current_hit {
            row.collision_flag = true;
            flagged += 1;
        }
    }

    info!(
        "collision audit: {} prior values with >1 current match, {} current values with >1 prior match, {} rows flagged",
        bad_priors.len(),
        bad_currents.len(),
        flagged
    );
    flagged
}

/// Tags present in the current filing that produced no output row.
/// Reported as a diagnostic set; isolated misses are not fatal. With
/// `categorized_only`, the comparison restricts to facts that landed in a
/// period category.
pub fn missing_tags(
    current: &[EnrichedFact],
    rows: &[MatchedRow],
    categorized_only: bool,
) -> BTreeSet<String> {
    let matched: HashSet<&str> = rows.iter().map(|r| r.tag.as_str()).collect();
    current
        .iter()
        .filter(|f| !categorized_only || f.date_type.is_some())
        .map(|f| f.tag.clone())
        .filter(|t| !matched.contains(t.as_str()))
        .collect()
}

/// Summarize missing tags by presentation role, the original review lens.
pub fn missing_tags_by_role(
    current: &[EnrichedFact],
    missing: &BTreeSet<String>,
) -> BTreeMap<String, usize> {
    let mut by_role: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for fact in current.iter().filter(|f| missing.contains(&f.tag)) {
        let role = fact
            .presentation_role
            .clone()
            .unwrap_or_else(|| "(none)".to_string());
        by_role.entry(role).or_default().insert(fact.tag.as_str());
    }
    by_role.into_iter().map(|(role, tags)| (role, tags.len())).collect()
}

fn disclosure_key(tag: &str, axes: &super::model::Axes) -> Vec<String> {
    let mut key = vec![tag.to_string()];
    for category in AxisCategory::ALL {
        key.push(axes.key_component(category).to_string());
    }
    key
}

/// Count (tag + axis tuple) combinations in the matched output that never
/// appeared in the prior-year filing: disclosures new this period.
pub fn new_disclosures(rows: &[MatchedRow], prior: &[EnrichedFact]) -> usize {
    let prior_keys: HashSet<Vec<String>> =
        prior.iter().map(|f| disclosure_key(&f.tag, &f.axes)).collect();
    let count = rows
        .iter()
        .filter(|r| !prior_keys.contains(&disclosure_key(&r.tag, &r.axes)))
        .count();
    info!("found {} new disclosures this period", count);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::model::{Axes, DateType};

    fn row(tag: &str, current: f64, prior: f64) -> MatchedRow {
        MatchedRow {
            tag: tag.to_string(),
            date_type: Some(DateType::Q),
            axes: Axes::default(),
            presentation_role: None,
            current_start: None,
            current_end: None,
            current_value: Some(current),
            current_context: None,
            prior_start: None,
            prior_end: None,
            prior_value: Some(prior),
            prior_context: None,
            collision_flag: false,
            visual_current: None,
            visual_prior: None,
        }
    }

    #[test]
    fn duplicate_prior_with_two_currents_flags_both_rows() {
        let mut rows = vec![
            row("us-gaap:Revenues", 100.0, 50.0),
            row("us-gaap:OtherIncome", 200.0, 50.0),
            row("us-gaap:CostOfRevenue", 300.0, 75.0),
        ];
        let flagged = flag_value_collisions(&mut rows);
        assert_eq!(flagged, 2);
        assert!(rows[0].collision_flag);
        assert!(rows[1].collision_flag);
        assert!(!rows[2].collision_flag);
    }

    #[test]
    fn duplicate_current_with_two_priors_flags_both_rows() {
        let mut rows = vec![
            row("us-gaap:Revenues", 100.0, 50.0),
            row("us-gaap:OtherIncome", 100.0, 60.0),
        ];
        assert_eq!(flag_value_collisions(&mut rows), 2);
        assert!(rows.iter().all(|r| r.collision_flag));
    }

    #[test]
    fn unique_pairings_stay_unflagged() {
        let mut rows = vec![
            row("us-gaap:Revenues", 100.0, 50.0),
            row("us-gaap:OtherIncome", 200.0, 60.0),
        ];
        assert_eq!(flag_value_collisions(&mut rows), 0);
        assert!(rows.iter().all(|r| !r.collision_flag));
    }

    #[test]
    fn repeated_identical_pairing_is_not_a_collision() {
        // Same pair twice is duplication, not ambiguity.
        let mut rows = vec![
            row("us-gaap:Revenues", 100.0, 50.0),
            row("us-gaap:Revenues", 100.0, 50.0),
        ];
        assert_eq!(flag_value_collisions(&mut rows), 0);
    }
}
