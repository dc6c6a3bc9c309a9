pub mod client;
pub mod index;
pub mod ixbrl;
pub mod presentation;
pub mod rate_limiter;
pub mod report;
pub mod source;
pub mod submissions;
pub mod tickers;

pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov";
pub const USER_AGENT: &str = "software@example.com";

pub use source::EdgarSource;
