use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use super::client::{fetch_json, fetch_text};
use crate::recon::error::ReconError;
use crate::recon::model::{FilingMeta, RawFact};
use crate::utils::dates::parse_date;

/// A document yielding fewer facts than this is an exhibit or cover page,
/// not the filing body.
pub const MIN_FACTS: usize = 50;

const PERIOD_END_TAG: &str = "dei:DocumentPeriodEndDate";

static CONTEXT_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<xbrli:context\b.*?</xbrli:context>").unwrap());
static CONTEXT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)id\s*=\s*"([^"]+)""#).unwrap());

/// Everything lifted out of one inline-XBRL document.
#[derive(Debug, Default)]
pub struct LoweredDocument {
    pub facts: Vec<RawFact>,
    pub context_blocks: HashMap<String, String>,
    pub document_period_end: Option<NaiveDate>,
}

fn clean_numeric(text: &str) -> Option<f64> {
    text.replace(',', "").replace('\u{2212}', "-").trim().parse::<f64>().ok()
}

/// Lower an inline-XBRL .htm document to tagged facts plus the raw context
/// blocks they reference. Context blocks are lifted verbatim so the
/// dimension resolver sees exactly what the filer wrote; facts keep their
/// display text next to the cleaned numeric value.
pub fn lower_document(html: &str) -> LoweredDocument {
    let mut lowered = LoweredDocument::default();

    for m in CONTEXT_BLOCK_RE.find_iter(html) {
        let block = m.as_str();
        let opening = block.split('>').next().unwrap_or("");
        if let Some(id) = CONTEXT_ID_RE.captures(opening) {
            lowered
                .context_blocks
                .insert(id.get(1).unwrap().as_str().to_string(), block.to_string());
        }
    }

    let document = Html::parse_document(html);
    let tagged = Selector::parse("[contextref]").expect("valid selector");

    for element in document.select(&tagged) {
        let el = element.value();
        if el.name() != "ix:nonfraction" && el.name() != "ix:nonnumeric" {
            continue;
        }
        let (name, ctx) = match (el.attr("name"), el.attr("contextref")) {
            (Some(name), Some(ctx)) => (name, ctx),
            _ => continue,
        };
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        if name == PERIOD_END_TAG {
            lowered.document_period_end = parse_date(&text);
        }

        let mut value = match clean_numeric(&text) {
            Some(v) => v,
            None => continue,
        };
        if el.attr("sign") == Some("-") {
            value = -value.abs();
        }

        lowered.facts.push(RawFact {
            tag: name.to_string(),
            context_ref: ctx.to_string(),
            value,
            text,
        });
    }

    lowered
}

#[derive(Debug, Deserialize)]
struct AccessionIndex {
    directory: AccessionDirectory,
}

#[derive(Debug, Deserialize)]
struct AccessionDirectory {
    #[serde(default)]
    item: Vec<IndexItem>,
}

#[derive(Debug, Deserialize, Clone)]
struct IndexItem {
    name: String,
    #[serde(default)]
    size: String,
}

fn accession_base_url(cik: &str, accession: &str) -> String {
    let cik_unpadded = cik.trim_start_matches('0');
    let acc_nodash = accession.replace('-', "");
    format!(
        "{}/Archives/edgar/data/{}/{}/",
        super::EDGAR_ARCHIVES_URL,
        cik_unpadded,
        acc_nodash
    )
}

/// Find and lower the main inline-XBRL document inside an accession.
/// The largest .htm file is almost always the filing body, so it goes
/// first; if it disappoints, every other .htm is scanned until one yields a
/// period end and a plausible fact count.
pub async fn load_main_document(
    client: &Client,
    meta: &FilingMeta,
    user_agent: &str,
) -> Result<LoweredDocument, ReconError> {
    let base = accession_base_url(&meta.cik, &meta.accession);
    let index_url = Url::parse(&format!("{}index.json", base)).expect("valid index URL");

    let index: AccessionIndex = fetch_json(client, &index_url, user_agent).await?;
    let mut htm_items: Vec<IndexItem> = index
        .directory
        .item
        .into_iter()
        .filter(|i| i.name.to_lowercase().ends_with(".htm"))
        .collect();
    // Largest first; unparseable sizes sink to the back of the scan.
    htm_items.sort_by_key(|i| std::cmp::Reverse(i.size.parse::<u64>().unwrap_or(0)));

    for (attempt, item) in htm_items.iter().enumerate() {
        let url = Url::parse(&format!("{}{}", base, item.name)).expect("valid document URL");
        if attempt == 0 {
            info!("trying largest .htm file first: {} ({} bytes)", item.name, item.size);
        }

        let html = match fetch_text(client, &url, user_agent, mime::TEXT_HTML).await {
            Ok(html) => html,
            Err(e) => {
                warn!("error fetching {}: {}", item.name, e);
                continue;
            }
        };

        let lowered = lower_document(&html);
        if lowered.document_period_end.is_none() {
            continue;
        }
        if lowered.facts.len() < MIN_FACTS {
            warn!(
                "only {} facts extracted from {} — possible exhibit or junk file",
                lowered.facts.len(),
                item.name
            );
            continue;
        }

        info!(
            "{} -> period end {:?}, {} facts",
            item.name,
            lowered.document_period_end,
            lowered.facts.len()
        );
        return Ok(lowered);
    }

    Err(ReconError::NoUsableDocument(meta.accession.clone()))
}
