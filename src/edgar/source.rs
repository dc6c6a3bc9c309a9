use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use std::collections::HashSet;

use super::{client, index, ixbrl, presentation, submissions, tickers::lookup_cik, tickers::Ticker};
use crate::core::config::YoyConfig;
use crate::core::types::{FactSource, FilingSet};
use crate::recon::error::ReconError;
use crate::recon::model::{FilingMeta, ParsedFiling};

/// Discovery tiers, tried in order until one yields enough history. The
/// submissions feed is fast but shallow; the full-index scan is slow but
/// complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscoveryTier {
    RecentSubmissions,
    FullIndexScan,
}

const DISCOVERY_TIERS: [DiscoveryTier; 2] =
    [DiscoveryTier::RecentSubmissions, DiscoveryTier::FullIndexScan];

/// The production filing source: SEC EDGAR over HTTP. Recent submissions
/// first, full-index scan when the feed comes up short.
pub struct EdgarSource {
    client: Client,
    config: YoyConfig,
}

impl EdgarSource {
    pub fn new(config: YoyConfig) -> Result<Self, ReconError> {
        Ok(EdgarSource {
            client: client::build_client()?,
            config,
        })
    }

    async fn discover(
        &self,
        tier: DiscoveryTier,
        cik: &str,
        max_year: i32,
    ) -> Result<(Vec<FilingMeta>, Vec<FilingMeta>), ReconError> {
        match tier {
            DiscoveryTier::RecentSubmissions => {
                let (quarterly, annual) = submissions::fetch_recent_accessions(
                    &self.client,
                    cik,
                    &self.config.user_agent,
                    &self.config.data_dir,
                )
                .await?;
                Ok((
                    submissions::filter_by_year(quarterly, max_year, self.config.quarterly_limit),
                    submissions::filter_by_year(annual, max_year, self.config.annual_limit),
                ))
            }
            DiscoveryTier::FullIndexScan => {
                let years = (max_year - (self.config.annual_limit as i32 - 1))..=(max_year + 1);
                let (mut quarterly, mut annual) = index::fetch_accessions_from_index(
                    &self.client,
                    cik,
                    &self.config.user_agent,
                    years,
                )
                .await?;
                quarterly.sort_by_key(|m| std::cmp::Reverse(m.report_date));
                annual.sort_by_key(|m| std::cmp::Reverse(m.report_date));
                Ok((quarterly, annual))
            }
        }
    }

    fn is_sufficient(&self, quarterly: &[FilingMeta], annual: &[FilingMeta]) -> bool {
        quarterly.len() >= self.config.quarterly_limit && annual.len() >= self.config.annual_limit
    }
}

#[async_trait]
impl FactSource for EdgarSource {
    async fn filings(&self, ticker: &Ticker, max_year: i32) -> Result<FilingSet, ReconError> {
        let cik = lookup_cik(&self.client, ticker, &self.config.user_agent, &self.config.data_dir)
            .await?;
        info!("using CIK for {}: {}", ticker, cik);

        let mut result: Option<(Vec<FilingMeta>, Vec<FilingMeta>, DiscoveryTier)> = None;
        for tier in DISCOVERY_TIERS {
            let (quarterly, annual) = self.discover(tier, &cik, max_year).await?;
            let sufficient = self.is_sufficient(&quarterly, &annual);
            result = Some((quarterly, annual, tier));
            if sufficient {
                break;
            }
            if tier != *DISCOVERY_TIERS.last().expect("non-empty tier list") {
                warn!("not enough filings from {:?} — trying the next discovery tier", tier);
            }
        }

        let (quarterly, annual, tier) = result.expect("at least one discovery tier ran");
        let used_fallback = tier != DiscoveryTier::RecentSubmissions;
        if !used_fallback {
            info!("using recent submissions only — fallback not needed");
        }

        Ok(FilingSet {
            quarterly,
            annual,
            used_fallback,
        })
    }

    async fn load(&self, meta: &FilingMeta) -> Result<ParsedFiling, ReconError> {
        let lowered =
            ixbrl::load_main_document(&self.client, meta, &self.config.user_agent).await?;
        let document_period_end = lowered
            .document_period_end
            .ok_or_else(|| ReconError::NoUsableDocument(meta.accession.clone()))?;

        let roles = presentation::fetch_presentation(&self.client, meta, &self.config.user_agent)
            .await?
            .concept_roles;

        Ok(ParsedFiling {
            meta: meta.clone(),
            document_period_end,
            facts: lowered.facts,
            context_blocks: lowered.context_blocks,
            concept_roles: roles,
        })
    }

    async fn negated_concepts(&self, meta: &FilingMeta) -> Result<HashSet<String>, ReconError> {
        Ok(
            presentation::fetch_presentation(&self.client, meta, &self.config.user_agent)
                .await?
                .negated_concepts,
        )
    }
}
