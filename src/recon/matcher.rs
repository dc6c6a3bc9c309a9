use log::{info, warn};
use rapidfuzz::fuzz;
use std::collections::{BTreeMap, HashSet};

use super::model::{AxisCategory, EnrichedFact, MatchedRow, NONE_KEY};
use crate::core::metrics::RunMetrics;

/// Tunable matching thresholds. The fuzzy values were settled empirically
/// against real filings; they are parameters here rather than constants so
/// a caller can retune them without touching the algorithm.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Minimum shared-group ratio before the adaptive pass stops dropping
    /// keys.
    pub min_overlap_ratio: f64,
    /// Per-axis partial-similarity score a fuzzy pairing must reach on
    /// every axis (0–100).
    pub fuzzy_accept: f64,
    /// Lower bound of the near-miss band; scores in
    /// `[fuzzy_review_floor, fuzzy_accept)` are logged for review, never
    /// emitted.
    pub fuzzy_review_floor: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        MatchSettings {
            min_overlap_ratio: 0.05,
            fuzzy_accept: 80.0,
            fuzzy_review_floor: 70.0,
        }
    }
}

/// One component of a match key, ordered most-specific-first in the key
/// lists below. The adaptive pass only ever drops from the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    Tag,
    DateType,
    End,
    PresentationRole,
    Axis(AxisCategory),
}

impl MatchKey {
    pub fn describe(self) -> &'static str {
        match self {
            MatchKey::Tag => "tag",
            MatchKey::DateType => "date_type",
            MatchKey::End => "end",
            MatchKey::PresentationRole => "presentation_role",
            MatchKey::Axis(category) => category.column(),
        }
    }

    fn component(self, fact: &EnrichedFact) -> String {
        match self {
            MatchKey::Tag => fact.tag.clone(),
            MatchKey::DateType => fact
                .date_type
                .map(|d| d.to_string())
                .unwrap_or_else(|| NONE_KEY.to_string()),
            MatchKey::End => fact.end().to_string(),
            MatchKey::PresentationRole => fact
                .presentation_role
                .clone()
                .unwrap_or_else(|| NONE_KEY.to_string()),
            MatchKey::Axis(category) => fact.axes.key_component(category).to_string(),
        }
    }
}

fn with_axes(mut keys: Vec<MatchKey>) -> Vec<MatchKey> {
    keys.extend(AxisCategory::ALL.map(MatchKey::Axis));
    keys
}

/// Flow-value matching: tag + date type, then the six axes.
pub fn flow_keys() -> Vec<MatchKey> {
    with_axes(vec![MatchKey::Tag, MatchKey::DateType])
}
pub const FLOW_MIN_KEYS: usize = 2;

/// Balance-sheet instant matching across filings: the period end date and
/// presentation role both discriminate.
pub fn instant_keys() -> Vec<MatchKey> {
    with_axes(vec![
        MatchKey::Tag,
        MatchKey::End,
        MatchKey::DateType,
        MatchKey::PresentationRole,
    ])
}
pub const INSTANT_MIN_KEYS: usize = 3;

/// Instant matching inside a single 10-K, where the role map is shared.
pub fn annual_instant_keys() -> Vec<MatchKey> {
    with_axes(vec![MatchKey::Tag, MatchKey::PresentationRole])
}
pub const ANNUAL_INSTANT_MIN_KEYS: usize = 1;

/// Looser keys for the missing-tag rescue pass (no presentation role).
pub fn rescue_keys() -> Vec<MatchKey> {
    with_axes(vec![MatchKey::Tag, MatchKey::End, MatchKey::DateType])
}

fn group_key(fact: &EnrichedFact, keys: &[MatchKey]) -> Vec<String> {
    keys.iter().map(|k| k.component(fact)).collect()
}

/// Group facts by key tuple, keeping emission order inside every group.
/// Group iteration order is the sorted key order, which keeps the matched
/// output deterministic.
fn group_by_keys<'a>(
    facts: &'a [EnrichedFact],
    keys: &[MatchKey],
) -> BTreeMap<Vec<String>, Vec<&'a EnrichedFact>> {
    let mut groups: BTreeMap<Vec<String>, Vec<&EnrichedFact>> = BTreeMap::new();
    for fact in facts {
        groups.entry(group_key(fact, keys)).or_default().push(fact);
    }
    groups
}

/// Shared-group ratio for a candidate key list: |shared keys| / |current
/// keys|.
pub fn overlap_ratio(current: &[EnrichedFact], prior: &[EnrichedFact], keys: &[MatchKey]) -> f64 {
    let current_groups = group_by_keys(current, keys);
    let prior_groups = group_by_keys(prior, keys);
    let shared = current_groups
        .keys()
        .filter(|k| prior_groups.contains_key(*k))
        .count();
    shared as f64 / current_groups.len().max(1) as f64
}

/// Progressively drop the least-significant key until the shared-group
/// overlap clears the threshold or the key list reaches the caller's
/// minimum. Prevents an over-constrained grouping (a relabeled axis member,
/// say) from silently losing otherwise-valid matches.
pub fn adapt_match_keys(
    current: &[EnrichedFact],
    prior: &[EnrichedFact],
    mut keys: Vec<MatchKey>,
    min_keys: usize,
    settings: &MatchSettings,
    metrics: &mut RunMetrics,
) -> Vec<MatchKey> {
    loop {
        let ratio = overlap_ratio(current, prior, &keys);
        info!(
            "matching on {:?}: overlap {:.2}% of current",
            keys.iter().map(|k| k.describe()).collect::<Vec<_>>(),
            ratio * 100.0
        );

        if ratio < settings.min_overlap_ratio && keys.len() > min_keys {
            let dropped = keys.pop().expect("non-empty key list");
            warn!("too few shared keys — dropping '{}'", dropped.describe());
            metrics.record(
                "match_keys_dropped",
                serde_json::json!({ dropped.describe(): true }),
            );
        } else {
            return keys;
        }
    }
}

/// Order-preserving positional match: inside every group present on both
/// sides, pair the i-th current record with the i-th prior record up to the
/// shorter length. Emission order standing in for a real pairing is a
/// documented approximation; the collision audit downstream is what catches
/// it when it is wrong.
pub fn zip_match(
    current: &[EnrichedFact],
    prior: &[EnrichedFact],
    keys: &[MatchKey],
) -> Vec<MatchedRow> {
    let current_groups = group_by_keys(current, keys);
    let prior_groups = group_by_keys(prior, keys);

    let mut rows = Vec::new();
    for (key, current_rows) in &current_groups {
        let prior_rows = match prior_groups.get(key) {
            Some(rows) => rows,
            None => continue,
        };
        for (c, p) in current_rows.iter().zip(prior_rows.iter()) {
            rows.push(MatchedRow::from_pair(c, p));
        }
    }
    rows
}

/// Adaptive key selection followed by the positional match; the shape every
/// exact matching stage shares.
pub fn match_stage(
    current: &[EnrichedFact],
    prior: &[EnrichedFact],
    keys: Vec<MatchKey>,
    min_keys: usize,
    settings: &MatchSettings,
    metrics: &mut RunMetrics,
) -> Vec<MatchedRow> {
    let keys = adapt_match_keys(current, prior, keys, min_keys, settings, metrics);
    zip_match(current, prior, &keys)
}

/// Anything that exposes a tag and the six axis slots can go through the
/// fuzzy fallback: enriched facts in the quarterly flow, already-matched
/// rows in the fourth-quarter merge.
pub trait AxisKeyed {
    fn tag(&self) -> &str;
    fn axis_component(&self, category: AxisCategory) -> &str;
}

impl AxisKeyed for EnrichedFact {
    fn tag(&self) -> &str {
        &self.tag
    }
    fn axis_component(&self, category: AxisCategory) -> &str {
        self.axes.key_component(category)
    }
}

impl AxisKeyed for MatchedRow {
    fn tag(&self) -> &str {
        &self.tag
    }
    fn axis_component(&self, category: AxisCategory) -> &str {
        self.axes.key_component(category)
    }
}

/// A fuzzy comparison that landed just under the acceptance bar; surfaced
/// for manual review, never included in output.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NearMiss {
    pub tag: String,
    pub axis: &'static str,
    pub current: String,
    pub prior: String,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct FuzzyOutcome {
    /// (left index, right index) pairs accepted by the similarity gate.
    pub pairs: Vec<(usize, usize)>,
    pub near_misses: Vec<NearMiss>,
}

fn axis_score(a: &str, b: &str) -> f64 {
    fuzz::partial_ratio(a.chars(), b.chars())
}

/// Pair leftover records that share an identical tag when every axis clears
/// the partial-similarity gate. First acceptable right-side candidate wins;
/// this is deliberately not best-match, mirroring how a reviewer walks the
/// remainder list. A second sweep collects the near-miss band.
pub fn fuzzy_pair<L: AxisKeyed, R: AxisKeyed>(
    left: &[L],
    right: &[R],
    settings: &MatchSettings,
) -> FuzzyOutcome {
    let mut outcome = FuzzyOutcome::default();

    for (li, l) in left.iter().enumerate() {
        for (ri, r) in right.iter().enumerate() {
            if l.tag() != r.tag() {
                continue;
            }
            let accepted = AxisCategory::ALL.iter().all(|category| {
                axis_score(l.axis_component(*category), r.axis_component(*category))
                    >= settings.fuzzy_accept
            });
            if accepted {
                outcome.pairs.push((li, ri));
                break;
            }
        }
    }

    for l in left {
        for r in right {
            if l.tag() != r.tag() {
                continue;
            }
            for category in AxisCategory::ALL {
                let a = l.axis_component(category);
                let b = r.axis_component(category);
                let score = axis_score(a, b);
                if score >= settings.fuzzy_review_floor && score < settings.fuzzy_accept {
                    outcome.near_misses.push(NearMiss {
                        tag: l.tag().to_string(),
                        axis: category.column(),
                        current: a.to_string(),
                        prior: b.to_string(),
                        score,
                    });
                }
            }
        }
    }

    outcome
}

/// Drop exact duplicate rows, keeping first occurrence.
pub fn dedup_exact(rows: Vec<MatchedRow>) -> Vec<MatchedRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.fingerprint()))
        .collect()
}

/// Drop rows repeating an already-seen (current, prior) value pair; the
/// export-level dedup.
pub fn dedup_by_value_pair(rows: Vec<MatchedRow>) -> Vec<MatchedRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.value_pair_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::model::{Axes, DateType, MatchedCategory, PeriodKind};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(tag: &str, value: f64, segment: Option<&str>) -> EnrichedFact {
        let mut axes = Axes::default();
        if let Some(s) = segment {
            axes.set(AxisCategory::Segment, s.to_string());
        }
        EnrichedFact {
            tag: tag.to_string(),
            value,
            context_ref: format!("c-{tag}-{value}"),
            period: PeriodKind::Duration {
                start: date(2024, 4, 1),
                end: date(2024, 6, 30),
            },
            matched_category: Some(MatchedCategory::CurrentQ),
            date_type: Some(DateType::Q),
            presentation_role: None,
            axes,
        }
    }

    #[test]
    fn zip_match_pairs_in_emission_order() {
        let current = vec![fact("us-gaap:Revenues", 10.0, None), fact("us-gaap:Revenues", 20.0, None)];
        let prior = vec![
            fact("us-gaap:Revenues", 8.0, None),
            fact("us-gaap:Revenues", 18.0, None),
            fact("us-gaap:Revenues", 99.0, None),
        ];
        let rows = zip_match(&current, &prior, &flow_keys());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_value, Some(10.0));
        assert_eq!(rows[0].prior_value, Some(8.0));
        assert_eq!(rows[1].current_value, Some(20.0));
        assert_eq!(rows[1].prior_value, Some(18.0));
    }

    #[test]
    fn zip_match_skips_one_sided_groups() {
        let current = vec![fact("us-gaap:Revenues", 10.0, None)];
        let prior = vec![fact("us-gaap:CostOfRevenue", 5.0, None)];
        assert!(zip_match(&current, &prior, &flow_keys()).is_empty());
    }

    #[test]
    fn adaptive_reduction_stops_at_min_keys() {
        // No overlap on any key set: with segment members renamed AND tags
        // disjoint, reduction must still halt at the minimum length.
        let current = vec![fact("us-gaap:Revenues", 10.0, Some("Alpha"))];
        let prior = vec![fact("us-gaap:OtherIncome", 9.0, Some("Beta"))];
        let keys = adapt_match_keys(
            &current,
            &prior,
            flow_keys(),
            FLOW_MIN_KEYS,
            &MatchSettings::default(),
            &mut RunMetrics::new(),
        );
        assert_eq!(keys.len(), FLOW_MIN_KEYS);
        assert_eq!(keys, vec![MatchKey::Tag, MatchKey::DateType]);
    }

    #[test]
    fn adaptive_reduction_recovers_renamed_axis_member() {
        // Same concept, one side relabeled its segment member: full keys
        // share nothing, but dropping down to tag+date_type matches.
        let current = vec![fact("us-gaap:Revenues", 10.0, Some("PlatformDivision"))];
        let prior = vec![fact("us-gaap:Revenues", 9.0, Some("PlatformGroup"))];

        let keys = adapt_match_keys(
            &current,
            &prior,
            flow_keys(),
            FLOW_MIN_KEYS,
            &MatchSettings::default(),
            &mut RunMetrics::new(),
        );
        let rows = zip_match(&current, &prior, &keys);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prior_value, Some(9.0));
    }

    #[test]
    fn overlap_ratio_never_decreases_as_keys_drop() {
        let current = vec![
            fact("us-gaap:Revenues", 1.0, Some("Alpha")),
            fact("us-gaap:Revenues", 2.0, Some("Beta")),
            fact("us-gaap:CostOfRevenue", 3.0, Some("Gamma")),
        ];
        let prior = vec![
            fact("us-gaap:Revenues", 4.0, Some("AlphaRenamed")),
            fact("us-gaap:Revenues", 5.0, Some("Beta")),
            fact("us-gaap:CostOfRevenue", 6.0, Some("GammaRenamed")),
        ];

        let mut keys = flow_keys();
        let mut last = overlap_ratio(&current, &prior, &keys);
        while keys.len() > FLOW_MIN_KEYS {
            keys.pop();
            let ratio = overlap_ratio(&current, &prior, &keys);
            assert!(ratio >= last, "overlap regressed: {ratio} < {last}");
            last = ratio;
        }
    }

    #[test]
    fn fuzzy_accepts_similar_axes_and_logs_near_misses() {
        let current = vec![fact(
            "us-gaap:Revenues",
            10.0,
            Some("us-gaap:AmericasSegmentMember"),
        )];
        // Close enough to clear 80 under partial similarity.
        let accepted_prior = vec![fact(
            "us-gaap:Revenues",
            9.0,
            Some("us-gaap:AmericasSegmentsMember"),
        )];
        let outcome = fuzzy_pair(&current, &accepted_prior, &MatchSettings::default());
        assert_eq!(outcome.pairs, vec![(0, 0)]);

        // A dissimilar member must not pair, whatever the tag.
        let rejected_prior = vec![fact("us-gaap:Revenues", 9.0, Some("zzzz"))];
        let outcome = fuzzy_pair(&current, &rejected_prior, &MatchSettings::default());
        assert!(outcome.pairs.is_empty());
    }

    #[test]
    fn fuzzy_requires_identical_tags() {
        let current = vec![fact("us-gaap:Revenues", 10.0, None)];
        let prior = vec![fact("us-gaap:RevenuesNet", 9.0, None)];
        let outcome = fuzzy_pair(&current, &prior, &MatchSettings::default());
        assert!(outcome.pairs.is_empty());
    }

    #[test]
    fn fuzzy_first_match_wins() {
        let current = vec![fact("us-gaap:Revenues", 10.0, Some("Alpha"))];
        let prior = vec![
            fact("us-gaap:Revenues", 8.0, Some("Alpha")),
            fact("us-gaap:Revenues", 9.0, Some("Alpha")),
        ];
        let outcome = fuzzy_pair(&current, &prior, &MatchSettings::default());
        assert_eq!(outcome.pairs, vec![(0, 0)]);
    }

    #[test]
    fn near_miss_band_is_logged_but_not_paired() {
        let settings = MatchSettings::default();
        // Seven of ten characters align: score 70, inside [70, 80).
        let current = vec![fact("us-gaap:Revenues", 10.0, Some("abcdefghij"))];
        let prior = vec![fact("us-gaap:Revenues", 9.0, Some("abcdefgXYZ"))];
        let outcome = fuzzy_pair(&current, &prior, &settings);
        assert!(outcome.pairs.is_empty());
        assert!(!outcome.near_misses.is_empty());
        for miss in &outcome.near_misses {
            assert!(miss.score >= settings.fuzzy_review_floor);
            assert!(miss.score < settings.fuzzy_accept);
            assert_eq!(miss.axis, "axis_segment");
        }
    }

    #[test]
    fn dedup_by_value_pair_keeps_first() {
        let current = vec![fact("us-gaap:Revenues", 10.0, None)];
        let prior = vec![fact("us-gaap:Revenues", 8.0, None)];
        let mut rows = zip_match(&current, &prior, &flow_keys());
        rows.extend(rows.clone());
        assert_eq!(dedup_by_value_pair(rows).len(), 1);
    }
}
