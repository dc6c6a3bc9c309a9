use chrono::NaiveDate;

/// Fatal conditions that abort a reconciliation run. Degraded paths (index
/// fallback, looser match keys, anchor estimates) never surface here; they
/// are recorded in the run metrics instead.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("no 10-K with a parseable period end — cannot derive a fiscal calendar")]
    NoFiscalCalendar,

    #[error("invalid quarter value: {0}. Must be 1, 2, 3, or 4")]
    InvalidQuarter(u8),

    #[error("no {form} filing found for {label}")]
    MissingFiling { form: String, label: String },

    #[error("no prior-year {label} filing — cannot proceed without prior comparison")]
    MissingPriorFiling { label: String },

    #[error("filing date {0} is before 2019 — inline XBRL not reliably available")]
    PreInlineXbrl(NaiveDate),

    #[error("ticker {0} not found in the company index")]
    UnknownTicker(String),

    #[error("no usable inline-XBRL document in accession {0}")]
    NoUsableDocument(String),

    #[error("unexpected response shape from {context}: {detail}")]
    BadResponse { context: String, detail: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
