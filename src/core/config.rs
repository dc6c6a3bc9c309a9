use anyhow::Result;
use std::path::PathBuf;

/// How many filings to work back through when building the fiscal
/// calendar. Twelve quarters and four annuals cover the current and prior
/// fiscal years with slack for amended or late filings.
pub const DEFAULT_QUARTERLY_LIMIT: usize = 12;
pub const DEFAULT_ANNUAL_LIMIT: usize = 4;

#[derive(Clone, Debug)]
pub struct YoyConfig {
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub quarterly_limit: usize,
    pub annual_limit: usize,
}

impl YoyConfig {
    pub fn from_env() -> Result<Self> {
        let user_agent = std::env::var("YOY_USER_AGENT")
            .unwrap_or_else(|_| crate::edgar::USER_AGENT.to_string());

        let data_dir =
            PathBuf::from(std::env::var("YOY_DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        let quarterly_limit = std::env::var("YOY_QUARTERLY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QUARTERLY_LIMIT);

        let annual_limit = std::env::var("YOY_ANNUAL_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ANNUAL_LIMIT);

        Ok(Self {
            user_agent,
            data_dir,
            quarterly_limit,
            annual_limit,
        })
    }
}

impl Default for YoyConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::edgar::USER_AGENT.to_string(),
            data_dir: PathBuf::from("data"),
            quarterly_limit: DEFAULT_QUARTERLY_LIMIT,
            annual_limit: DEFAULT_ANNUAL_LIMIT,
        }
    }
}
