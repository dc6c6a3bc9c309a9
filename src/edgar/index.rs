use log::{info, warn};
use reqwest::Client;
use url::Url;

use super::client::fetch_text;
use super::report::ReportType;
use crate::recon::error::ReconError;
use crate::recon::model::FilingMeta;
use crate::utils::dates::parse_date;

const QUARTER_DIRS: [&str; 4] = ["QTR1", "QTR2", "QTR3", "QTR4"];

fn parse_master_lines(
    body: &str,
    cik_unpadded: &str,
    quarterly: &mut Vec<FilingMeta>,
    annual: &mut Vec<FilingMeta>,
) {
    let mut started = false;
    for line in body.lines() {
        if !started {
            if line.trim_start().starts_with("CIK|") {
                started = true;
            }
            continue;
        }

        let fields: Vec<&str> = line.trim().split('|').collect();
        if fields.len() != 5 {
            continue;
        }
        let [cik_field, _company, form, date_filed, filename] = [
            fields[0], fields[1], fields[2], fields[3], fields[4],
        ];
        if cik_field != cik_unpadded {
            continue;
        }
        if form != "10-Q" && form != "10-K" {
            continue;
        }

        let accession = filename
            .rsplit('/')
            .next()
            .unwrap_or(filename)
            .trim_end_matches(".txt")
            .to_string();
        // The index carries the filing date, not the period end; the
        // relabeling pass after download corrects it from the document.
        let mut meta = FilingMeta::new(
            form.parse::<ReportType>().expect("infallible form parse"),
            accession,
            parse_date(date_filed),
        );
        meta.cik = format!("{:0>10}", cik_field);

        match meta.form {
            ReportType::Form10Q => quarterly.push(meta),
            ReportType::Form10K => annual.push(meta),
            ReportType::Other(_) => {}
        }
    }
}

/// Fallback discovery path: walk the quarterly master index files for a
/// year window and collect every 10-Q/10-K the company filed. Slow (one
/// request per year-quarter) but complete, unlike the recent-submissions
/// feed.
pub async fn fetch_accessions_from_index(
    client: &Client,
    cik: &str,
    user_agent: &str,
    years: std::ops::RangeInclusive<i32>,
) -> Result<(Vec<FilingMeta>, Vec<FilingMeta>), ReconError> {
    let cik_unpadded = cik.trim_start_matches('0').to_string();
    let mut quarterly = Vec::new();
    let mut annual = Vec::new();

    for year in years {
        for qtr in QUARTER_DIRS {
            let url = Url::parse(&format!(
                "{}/Archives/edgar/full-index/{}/{}/master.idx",
                super::EDGAR_ARCHIVES_URL,
                year,
                qtr
            ))
            .expect("valid index URL");
            info!("downloading {}", url);

            let body = match fetch_text(client, &url, user_agent, mime::TEXT_PLAIN).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("failed to fetch {} {}: {}", year, qtr, e);
                    continue;
                }
            };
            parse_master_lines(&body, &cik_unpadded, &mut quarterly, &mut annual);
        }
    }

    info!(
        "found {} 10-Q and {} 10-K accessions in the full index",
        quarterly.len(),
        annual.len()
    );
    Ok((quarterly, annual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_index_lines_parse_for_matching_cik() {
        let body = "Description: Master Index\n\
                    CIK|Company Name|Form Type|Date Filed|Filename\n\
                    --------------------------------------------\n\
                    320193|Apple Inc.|10-Q|2024-08-02|edgar/data/320193/0000320193-24-000081.txt\n\
                    320193|Apple Inc.|8-K|2024-08-01|edgar/data/320193/0000320193-24-000080.txt\n\
                    789019|Microsoft Corp|10-K|2024-07-30|edgar/data/789019/0000789019-24-000040.txt\n";
        let mut quarterly = Vec::new();
        let mut annual = Vec::new();
        parse_master_lines(body, "320193", &mut quarterly, &mut annual);

        assert_eq!(quarterly.len(), 1);
        assert_eq!(quarterly[0].accession, "0000320193-24-000081");
        assert_eq!(quarterly[0].cik, "0000320193");
        assert!(annual.is_empty());
    }
}
