use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::model::{Axes, AxisCategory, Context, Dimension, PeriodKind};
use crate::utils::dates::parse_date;

static START_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<xbrli:startdate>(.*?)</xbrli:startdate>").unwrap());
static END_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<xbrli:enddate>(.*?)</xbrli:enddate>").unwrap());
static INSTANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<xbrli:instant>(.*?)</xbrli:instant>").unwrap());

/// Ordered axis classification rules; the first rule with a keyword hit
/// wins. An axis matching no rule is preserved verbatim under Unassigned so
/// later audits can see what the classifier missed.
pub struct AxisRule {
    pub category: AxisCategory,
    pub keywords: &'static [&'static str],
}

pub const AXIS_RULES: [AxisRule; 5] = [
    AxisRule { category: AxisCategory::Consolidation, keywords: &["consolidation"] },
    AxisRule { category: AxisCategory::Segment, keywords: &["segment", "business"] },
    AxisRule { category: AxisCategory::Product, keywords: &["product", "service"] },
    AxisRule { category: AxisCategory::Geo, keywords: &["geo", "region", "country"] },
    AxisRule { category: AxisCategory::LegalEntity, keywords: &["legal", "entity"] },
];

pub fn classify_axis(axis: &str) -> AxisCategory {
    let axis = axis.to_lowercase();
    for rule in &AXIS_RULES {
        if rule.keywords.iter().any(|k| axis.contains(k)) {
            return rule.category;
        }
    }
    AxisCategory::Unassigned
}

/// Fold a context's dimensions into the six axis slots. Classified members
/// land in their category slot; everything else is kept as "axis=member"
/// text under the unassigned slot.
pub fn assign_axes(dimensions: &[Dimension]) -> Axes {
    let mut axes = Axes::default();
    let mut unassigned = Vec::new();

    for dim in dimensions {
        match classify_axis(&dim.axis) {
            AxisCategory::Unassigned => {
                unassigned.push(format!("{}={}", dim.axis.to_lowercase(), dim.member));
            }
            category => axes.set(category, dim.member.clone()),
        }
    }

    if !unassigned.is_empty() {
        axes.set(AxisCategory::Unassigned, unassigned.join("|"));
    }
    axes
}

/// Pull explicit-member dimensions out of a raw context block. The block
/// comes straight from the filing, so its namespace prefixes are undeclared;
/// a wrapper element injects the ones the instance schema guarantees. A
/// block the XML parser cannot handle (typed members under a filer prefix,
/// mangled markup) yields no dimensions rather than killing the fact.
pub fn extract_dimensions(block: &str) -> Vec<Dimension> {
    let wrapped = format!(
        concat!(
            r#"<root xmlns:xbrli="http://www.xbrl.org/2003/instance""#,
            r#" xmlns:xbrldi="http://xbrl.org/2006/xbrldi""#,
            r#" xmlns:us-gaap="http://fasb.org/us-gaap/2024-01-31""#,
            r#" xmlns:srt="http://fasb.org/srt">{}</root>"#
        ),
        block
    );

    let doc = match roxmltree::Document::parse(&wrapped) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("failed to parse context block: {}", e);
            return Vec::new();
        }
    };

    let segment = doc
        .descendants()
        .find(|n| n.tag_name().name().eq_ignore_ascii_case("segment"));
    let segment = match segment {
        Some(node) => node,
        None => return Vec::new(),
    };

    let mut dimensions = Vec::new();
    for member in segment
        .descendants()
        .filter(|n| n.tag_name().name().eq_ignore_ascii_case("explicitmember"))
    {
        let axis = member.attribute("dimension");
        let value = member.text();
        if let (Some(axis), Some(value)) = (axis, value) {
            dimensions.push(Dimension {
                axis: axis.trim().to_string(),
                member: value.trim().to_string(),
            });
        }
    }
    dimensions
}

/// Detect the period carried by a raw context block: duration when both
/// start and end tags parse, instant when a single instant tag parses.
pub fn extract_period(block: &str) -> Option<PeriodKind> {
    let start = START_DATE_RE
        .captures(block)
        .and_then(|c| parse_date(c.get(1).unwrap().as_str().trim()));
    let end = END_DATE_RE
        .captures(block)
        .and_then(|c| parse_date(c.get(1).unwrap().as_str().trim()));

    if let (Some(start), Some(end)) = (start, end) {
        return Some(PeriodKind::Duration { start, end });
    }

    INSTANT_RE
        .captures(block)
        .and_then(|c| parse_date(c.get(1).unwrap().as_str().trim()))
        .map(PeriodKind::Instant)
}

/// Resolve every raw context block into a typed [`Context`]. Blocks with no
/// parseable period bounds are dropped; a fact is unusable without one.
pub fn resolve_contexts(blocks: &HashMap<String, String>) -> HashMap<String, Context> {
    let mut contexts = HashMap::new();
    for (id, block) in blocks {
        if id.is_empty() {
            continue;
        }
        if let Some(period) = extract_period(block) {
            contexts.insert(
                id.clone(),
                Context {
                    id: id.clone(),
                    period,
                    dimensions: extract_dimensions(block),
                },
            );
        }
    }
    log::info!("mapped {} context refs to periods", contexts.len());
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dim(axis: &str, member: &str) -> Dimension {
        Dimension { axis: axis.to_string(), member: member.to_string() }
    }

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(
            classify_axis("srt:ConsolidationItemsAxis"),
            AxisCategory::Consolidation
        );
        assert_eq!(
            classify_axis("us-gaap:StatementBusinessSegmentsAxis"),
            AxisCategory::Segment
        );
        assert_eq!(classify_axis("srt:ProductOrServiceAxis"), AxisCategory::Product);
        assert_eq!(classify_axis("srt:StatementGeographicalAxis"), AxisCategory::Geo);
        assert_eq!(classify_axis("dei:LegalEntityAxis"), AxisCategory::LegalEntity);
        assert_eq!(classify_axis("custom:RestructuringPlanAxis"), AxisCategory::Unassigned);
    }

    #[test]
    fn unassigned_axes_are_preserved_verbatim() {
        let axes = assign_axes(&[
            dim("us-gaap:StatementBusinessSegmentsAxis", "us-gaap:AmericasMember"),
            dim("custom:VintageAxis", "custom:Y2024Member"),
        ]);
        assert_eq!(axes.get(AxisCategory::Segment), Some("us-gaap:AmericasMember"));
        assert_eq!(
            axes.get(AxisCategory::Unassigned),
            Some("custom:vintageaxis=custom:Y2024Member")
        );
    }

    #[test]
    fn duration_and_instant_periods_parse() {
        let duration = r#"<xbrli:context id="c1"><xbrli:period>
            <xbrli:startDate>2024-04-01</xbrli:startDate>
            <xbrli:endDate>2024-06-30</xbrli:endDate>
        </xbrli:period></xbrli:context>"#;
        assert_eq!(
            extract_period(duration),
            Some(PeriodKind::Duration {
                start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            })
        );

        let instant = r#"<xbrli:context id="c2"><xbrli:period>
            <xbrli:instant>2024-06-30</xbrli:instant>
        </xbrli:period></xbrli:context>"#;
        assert_eq!(
            extract_period(instant),
            Some(PeriodKind::Instant(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()))
        );
    }

    #[test]
    fn contexts_without_parseable_bounds_are_dropped() {
        let mut blocks = HashMap::new();
        blocks.insert(
            "good".to_string(),
            "<xbrli:period><xbrli:instant>2024-06-30</xbrli:instant></xbrli:period>".to_string(),
        );
        blocks.insert(
            "bad".to_string(),
            "<xbrli:period><xbrli:instant>n/a</xbrli:instant></xbrli:period>".to_string(),
        );
        let contexts = resolve_contexts(&blocks);
        assert!(contexts.contains_key("good"));
        assert!(!contexts.contains_key("bad"));
    }

    #[test]
    fn explicit_members_extracted_from_segment() {
        let block = r#"<xbrli:context id="c3">
            <xbrli:entity>
                <xbrli:identifier scheme="http://www.sec.gov/CIK">0000000000</xbrli:identifier>
                <xbrli:segment>
                    <xbrldi:explicitMember dimension="us-gaap:StatementBusinessSegmentsAxis">us-gaap:AmericasMember</xbrldi:explicitMember>
                </xbrli:segment>
            </xbrli:entity>
            <xbrli:period><xbrli:instant>2024-06-30</xbrli:instant></xbrli:period>
        </xbrli:context>"#;
        let dims = extract_dimensions(block);
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].axis, "us-gaap:StatementBusinessSegmentsAxis");
        assert_eq!(dims[0].member, "us-gaap:AmericasMember");
    }
}
