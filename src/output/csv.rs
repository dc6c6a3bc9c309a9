use csv::WriterBuilder;
use log::info;
use std::path::{Path, PathBuf};

use crate::core::types::RunReport;
use crate::recon::error::ReconError;

/// Conventional export name: `AAPL_2Q24_final_visual.csv`.
pub fn report_filename(report: &RunReport) -> String {
    format!("{}_{}_final_visual.csv", report.target.ticker, report.target.label)
}

/// Write the matched dataset for the spreadsheet model: one row per
/// comparison with the sign-normalized values, the filer's presentation
/// role for grouping, and the collision flag so ambiguous matches stay
/// visible instead of silently trusted. Returns the written path.
pub fn write_report(report: &RunReport, dir: &Path) -> Result<PathBuf, ReconError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_filename(report));

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(std::fs::File::create(&path)?);

    writer
        .write_record([
            "tag",
            "current_value",
            "prior_value",
            "presentation_role",
            "collision_flag",
        ])
        .map_err(io_error)?;

    for row in &report.rows {
        let current = row.visual_current.or(row.current_value);
        let prior = row.visual_prior.or(row.prior_value);
        writer
            .write_record([
                row.tag.as_str(),
                &render(current),
                &render(prior),
                row.presentation_role.as_deref().unwrap_or(""),
                if row.collision_flag { "1" } else { "0" },
            ])
            .map_err(io_error)?;
    }
    writer.flush()?;

    info!(
        "{} {} data from {} written to {:?} ({} rows)",
        report.target.label,
        report.target.form,
        report.target.ticker,
        path,
        report.rows.len()
    );
    Ok(path)
}

fn render(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn io_error(e: csv::Error) -> ReconError {
    ReconError::Io(std::io::Error::other(e))
}
