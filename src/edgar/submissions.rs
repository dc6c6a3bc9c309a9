use chrono::Datelike;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use super::client::fetch_and_save;
use super::report::ReportType;
use crate::recon::error::ReconError;
use crate::recon::model::FilingMeta;
use crate::utils::dates::parse_date;

/// Column-oriented recent-filings block from the submissions feed. Only the
/// columns the reconciliation cares about are deserialized; report dates
/// stay strings because the feed leaves them empty for some form types.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "reportDate")]
    pub report_date: Vec<String>,
    #[serde(rename = "form")]
    pub form: Vec<ReportType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanySubmissions {
    pub cik: String,
    pub name: String,
    pub filings: FilingsData,
}

/// Fetch the recent 10-Q and 10-K accessions for a company from the
/// real-time submissions feed. The feed only carries the most recent few
/// hundred filings; when that is not enough history the caller falls back
/// to the full index scan.
pub async fn fetch_recent_accessions(
    client: &Client,
    cik: &str,
    user_agent: &str,
    data_dir: &Path,
) -> Result<(Vec<FilingMeta>, Vec<FilingMeta>), ReconError> {
    let padded = format!("{:0>10}", cik);
    let url = Url::parse(&format!("{}/submissions/CIK{}.json", super::EDGAR_DATA_URL, padded))
        .expect("valid submissions URL");

    let path = data_dir.join(format!("CIK{}.json", padded));
    if !path.exists() {
        fetch_and_save(client, &url, &path, user_agent).await?;
    }

    let submissions: CompanySubmissions =
        serde_json::from_str(&std::fs::read_to_string(&path)?).map_err(|e| {
            ReconError::BadResponse {
                context: url.to_string(),
                detail: format!("failed to parse submissions JSON: {}", e),
            }
        })?;

    let recent = &submissions.filings.recent;
    if recent.accession_number.len() != recent.form.len()
        || recent.accession_number.len() != recent.report_date.len()
    {
        return Err(ReconError::BadResponse {
            context: url.to_string(),
            detail: "submissions columns have mismatched lengths".to_string(),
        });
    }

    let mut quarterly = Vec::new();
    let mut annual = Vec::new();
    for i in 0..recent.form.len() {
        let mut meta = FilingMeta::new(
            recent.form[i].clone(),
            recent.accession_number[i].clone(),
            parse_date(&recent.report_date[i]),
        );
        meta.cik = padded.clone();
        match meta.form {
            ReportType::Form10Q => quarterly.push(meta),
            ReportType::Form10K => annual.push(meta),
            ReportType::Other(_) => {}
        }
    }

    info!(
        "found {} 10-Q and {} 10-K accessions in recent submissions",
        quarterly.len(),
        annual.len()
    );
    Ok((quarterly, annual))
}

/// Keep filings whose period end falls in or before `max_year`, up to
/// `limit` entries, preserving feed order (newest first).
pub fn filter_by_year(metas: Vec<FilingMeta>, max_year: i32, limit: usize) -> Vec<FilingMeta> {
    metas
        .into_iter()
        .filter(|m| m.report_date.map(|d| d.year() <= max_year).unwrap_or(false))
        .take(limit)
        .collect()
}
