use log::info;
use std::collections::HashSet;

use super::model::MatchedRow;

/// Apply the filer's own display-sign conventions as the last step before
/// export. Concepts carrying a negated preferred label (expenses tagged
/// positive but presented negative, typically) get their visual value
/// flipped; everything else passes through. Current and prior columns are
/// flipped independently and missing values stay missing.
pub fn apply_visual_signs(rows: &mut [MatchedRow], negated: &HashSet<String>) -> (usize, usize) {
    let mut flipped_current = 0;
    let mut flipped_prior = 0;

    for row in rows.iter_mut() {
        let negate = negated.contains(&row.tag);
        row.visual_current = row.current_value.map(|v| if negate { -v } else { v });
        row.visual_prior = row.prior_value.map(|v| if negate { -v } else { v });
        if negate {
            if row.current_value.is_some() {
                flipped_current += 1;
            }
            if row.prior_value.is_some() {
                flipped_prior += 1;
            }
        }
    }

    info!(
        "sign flip applied on {} current and {} prior values",
        flipped_current, flipped_prior
    );
    (flipped_current, flipped_prior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::model::{Axes, DateType};

    fn row(tag: &str, current: Option<f64>, prior: Option<f64>) -> MatchedRow {
        MatchedRow {
            tag: tag.to_string(),
            date_type: Some(DateType::Q),
            axes: Axes::default(),
            presentation_role: None,
            current_start: None,
            current_end: None,
            current_value: current,
            current_context: None,
            prior_start: None,
            prior_end: None,
            prior_value: prior,
            prior_context: None,
            collision_flag: false,
            visual_current: None,
            visual_prior: None,
        }
    }

    #[test]
    fn negated_tags_flip_and_others_pass_through() {
        let negated: HashSet<String> =
            ["us-gaap:OperatingExpenses".to_string()].into_iter().collect();
        let mut rows = vec![
            row("us-gaap:OperatingExpenses", Some(500.0), Some(450.0)),
            row("us-gaap:Revenues", Some(500.0), Some(450.0)),
        ];
        let (current, prior) = apply_visual_signs(&mut rows, &negated);
        assert_eq!((current, prior), (1, 1));
        assert_eq!(rows[0].visual_current, Some(-500.0));
        assert_eq!(rows[0].visual_prior, Some(-450.0));
        assert_eq!(rows[1].visual_current, Some(500.0));
        assert_eq!(rows[1].visual_prior, Some(450.0));
    }

    #[test]
    fn missing_values_stay_missing() {
        let negated: HashSet<String> =
            ["us-gaap:OperatingExpenses".to_string()].into_iter().collect();
        let mut rows = vec![row("us-gaap:OperatingExpenses", Some(500.0), None)];
        let (current, prior) = apply_visual_signs(&mut rows, &negated);
        assert_eq!((current, prior), (1, 0));
        assert_eq!(rows[0].visual_prior, None);
    }
}
