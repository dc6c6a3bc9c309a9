use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::edgar::report::ReportType;

/// Placeholder used wherever a missing axis value participates in a match key.
pub const NONE_KEY: &str = "__NONE__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
}

impl Quarter {
    pub fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Quarter::Q1),
            2 => Some(Quarter::Q2),
            3 => Some(Quarter::Q3),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// Filing metadata as returned by the submissions feed, plus the fiscal
/// labels the calendar resolver attaches. Immutable once labeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingMeta {
    pub form: ReportType,
    pub accession: String,
    pub cik: String,
    pub report_date: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
    pub fiscal_year_end: Option<NaiveDate>,
    pub quarter: Option<Quarter>,
    pub calendar_year: Option<i32>,
    pub label: Option<String>,
    pub non_standard_period: bool,
}

impl FilingMeta {
    pub fn new(form: ReportType, accession: impl Into<String>, report_date: Option<NaiveDate>) -> Self {
        FilingMeta {
            form,
            accession: accession.into(),
            cik: String::new(),
            report_date,
            fiscal_year: None,
            fiscal_year_end: None,
            quarter: None,
            calendar_year: None,
            label: None,
            non_standard_period: false,
        }
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.form, self.accession))
    }
}

/// A single tagged numeric data point lifted out of an inline-XBRL document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFact {
    pub tag: String,
    pub context_ref: String,
    pub value: f64,
    pub text: String,
}

/// One retrieved and lowered filing: facts plus the raw context blocks they
/// reference. Context blocks stay unparsed here; the dimension resolver
/// owns that step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFiling {
    pub meta: FilingMeta,
    pub document_period_end: NaiveDate,
    pub facts: Vec<RawFact>,
    pub context_blocks: HashMap<String, String>,
    pub concept_roles: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodKind {
    Duration { start: NaiveDate, end: NaiveDate },
    Instant(NaiveDate),
}

impl PeriodKind {
    pub fn is_instant(&self) -> bool {
        matches!(self, PeriodKind::Instant(_))
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            PeriodKind::Duration { start, .. } => Some(*start),
            PeriodKind::Instant(_) => None,
        }
    }

    pub fn end(&self) -> NaiveDate {
        match self {
            PeriodKind::Duration { end, .. } => *end,
            PeriodKind::Instant(date) => *date,
        }
    }
}

/// An axis/member pair from a context's segment block, e.g.
/// ("us-gaap:StatementBusinessSegmentsAxis", "us-gaap:AmericasSegmentMember").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub axis: String,
    pub member: String,
}

/// A reporting context: the period and dimensional qualification shared by
/// one or more facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub period: PeriodKind,
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisCategory {
    Consolidation,
    Segment,
    Product,
    Geo,
    LegalEntity,
    Unassigned,
}

impl AxisCategory {
    pub const ALL: [AxisCategory; 6] = [
        AxisCategory::Consolidation,
        AxisCategory::Segment,
        AxisCategory::Product,
        AxisCategory::Geo,
        AxisCategory::LegalEntity,
        AxisCategory::Unassigned,
    ];

    pub fn column(self) -> &'static str {
        match self {
            AxisCategory::Consolidation => "axis_consolidation",
            AxisCategory::Segment => "axis_segment",
            AxisCategory::Product => "axis_product",
            AxisCategory::Geo => "axis_geo",
            AxisCategory::LegalEntity => "axis_legal_entity",
            AxisCategory::Unassigned => "axis_unassigned",
        }
    }
}

/// The six axis-category slots carried by every enriched fact and matched
/// row. Missing slots stay None and render as [`NONE_KEY`] in match keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axes {
    pub consolidation: Option<String>,
    pub segment: Option<String>,
    pub product: Option<String>,
    pub geo: Option<String>,
    pub legal_entity: Option<String>,
    pub unassigned: Option<String>,
}

impl Axes {
    pub fn get(&self, category: AxisCategory) -> Option<&str> {
        match category {
            AxisCategory::Consolidation => self.consolidation.as_deref(),
            AxisCategory::Segment => self.segment.as_deref(),
            AxisCategory::Product => self.product.as_deref(),
            AxisCategory::Geo => self.geo.as_deref(),
            AxisCategory::LegalEntity => self.legal_entity.as_deref(),
            AxisCategory::Unassigned => self.unassigned.as_deref(),
        }
    }

    pub fn set(&mut self, category: AxisCategory, value: String) {
        let slot = match category {
            AxisCategory::Consolidation => &mut self.consolidation,
            AxisCategory::Segment => &mut self.segment,
            AxisCategory::Product => &mut self.product,
            AxisCategory::Geo => &mut self.geo,
            AxisCategory::LegalEntity => &mut self.legal_entity,
            AxisCategory::Unassigned => &mut self.unassigned,
        };
        *slot = Some(value);
    }

    pub fn key_component(&self, category: AxisCategory) -> &str {
        self.get(category).unwrap_or(NONE_KEY)
    }

    pub fn is_empty(&self) -> bool {
        AxisCategory::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchedCategory {
    CurrentQ,
    PriorQ,
    CurrentYtd,
    PriorYtd,
    CurrentFullYear,
    PriorFullYear,
}

impl MatchedCategory {
    /// Every category maps to exactly one date type; there is no other path
    /// to a `date_type` value.
    pub fn date_type(self) -> DateType {
        match self {
            MatchedCategory::CurrentQ | MatchedCategory::PriorQ => DateType::Q,
            MatchedCategory::CurrentYtd | MatchedCategory::PriorYtd => DateType::Ytd,
            MatchedCategory::CurrentFullYear | MatchedCategory::PriorFullYear => DateType::Fy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateType {
    Q,
    Ytd,
    Fy,
}

impl fmt::Display for DateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateType::Q => write!(f, "Q"),
            DateType::Ytd => write!(f, "YTD"),
            DateType::Fy => write!(f, "FY"),
        }
    }
}

/// A raw fact joined with its context, axis assignments, presentation role
/// and period classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFact {
    pub tag: String,
    pub value: f64,
    pub context_ref: String,
    pub period: PeriodKind,
    pub matched_category: Option<MatchedCategory>,
    pub date_type: Option<DateType>,
    pub presentation_role: Option<String>,
    pub axes: Axes,
}

impl EnrichedFact {
    pub fn start(&self) -> Option<NaiveDate> {
        self.period.start()
    }

    pub fn end(&self) -> NaiveDate {
        self.period.end()
    }

    pub fn is_instant(&self) -> bool {
        self.period.is_instant()
    }
}

/// One current-vs-prior comparison row. Produced only by the matcher (or
/// the fourth-quarter synthesizer, which subtracts two matched sets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub tag: String,
    pub date_type: Option<DateType>,
    pub axes: Axes,
    pub presentation_role: Option<String>,
    pub current_start: Option<NaiveDate>,
    pub current_end: Option<NaiveDate>,
    pub current_value: Option<f64>,
    pub current_context: Option<String>,
    pub prior_start: Option<NaiveDate>,
    pub prior_end: Option<NaiveDate>,
    pub prior_value: Option<f64>,
    pub prior_context: Option<String>,
    pub collision_flag: bool,
    pub visual_current: Option<f64>,
    pub visual_prior: Option<f64>,
}

impl MatchedRow {
    pub fn from_pair(current: &EnrichedFact, prior: &EnrichedFact) -> Self {
        MatchedRow {
            tag: current.tag.clone(),
            date_type: current.date_type,
            axes: current.axes.clone(),
            presentation_role: current.presentation_role.clone(),
            current_start: current.start(),
            current_end: Some(current.end()),
            current_value: Some(current.value),
            current_context: Some(current.context_ref.clone()),
            prior_start: prior.start(),
            prior_end: Some(prior.end()),
            prior_value: Some(prior.value),
            prior_context: Some(prior.context_ref.clone()),
            collision_flag: false,
            visual_current: None,
            visual_prior: None,
        }
    }

    /// Stable identity over every field that matters for exact-duplicate
    /// removal.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = vec![self.tag.clone()];
        parts.push(match self.date_type {
            Some(dt) => dt.to_string(),
            None => NONE_KEY.to_string(),
        });
        for category in AxisCategory::ALL {
            parts.push(self.axes.key_component(category).to_string());
        }
        for date in [self.current_start, self.current_end, self.prior_start, self.prior_end] {
            parts.push(date.map(|d| d.to_string()).unwrap_or_default());
        }
        for value in [self.current_value, self.prior_value] {
            parts.push(value.map(|v| v.to_bits().to_string()).unwrap_or_default());
        }
        parts.join("|")
    }

    /// Identity by reported values only, used for the final export dedup.
    pub fn value_pair_key(&self) -> (Option<u64>, Option<u64>) {
        (
            self.current_value.map(f64::to_bits),
            self.prior_value.map(f64::to_bits),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_type_is_deterministic_per_category() {
        assert_eq!(MatchedCategory::CurrentQ.date_type(), DateType::Q);
        assert_eq!(MatchedCategory::PriorQ.date_type(), DateType::Q);
        assert_eq!(MatchedCategory::CurrentYtd.date_type(), DateType::Ytd);
        assert_eq!(MatchedCategory::PriorYtd.date_type(), DateType::Ytd);
        assert_eq!(MatchedCategory::CurrentFullYear.date_type(), DateType::Fy);
        assert_eq!(MatchedCategory::PriorFullYear.date_type(), DateType::Fy);
    }

    #[test]
    fn axes_round_trip_and_key_component() {
        let mut axes = Axes::default();
        assert!(axes.is_empty());
        axes.set(AxisCategory::Segment, "AmericasSegmentMember".to_string());
        assert_eq!(axes.get(AxisCategory::Segment), Some("AmericasSegmentMember"));
        assert_eq!(axes.key_component(AxisCategory::Geo), NONE_KEY);
        assert!(!axes.is_empty());
    }

    #[test]
    fn period_kind_bounds() {
        let d = PeriodKind::Duration {
            start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        };
        assert_eq!(d.start(), Some(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert_eq!(d.end(), NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());

        let i = PeriodKind::Instant(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert!(i.is_instant());
        assert_eq!(i.start(), None);
        assert_eq!(i.end(), NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    }
}
