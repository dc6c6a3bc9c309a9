use anyhow::Result;
use structopt::StructOpt;
use yoy::core::config::YoyConfig;
use yoy::core::types::RunStatus;
use yoy::edgar::{tickers::Ticker, EdgarSource};
use yoy::output::csv::write_report;
use yoy::recon::{self, MatchSettings, RunRequest};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "yoy-cli",
    about = "Reconcile a company's filed XBRL facts against the prior-year period"
)]
struct Opt {
    /// Ticker symbol, e.g. AAPL
    ticker: String,

    /// Fiscal year of the target period, e.g. 2024
    year: i32,

    /// Fiscal quarter 1-4 (4 builds the implied fourth quarter)
    quarter: u8,

    /// With quarter 4: reconcile the full year instead of the derived Q4
    #[structopt(long)]
    full_year: bool,

    /// Directory for the CSV export and the metrics summary
    #[structopt(long, default_value = "exports")]
    output_dir: std::path::PathBuf,

    /// Fuzzy acceptance threshold (0-100)
    #[structopt(long, default_value = "80")]
    fuzzy_accept: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let config = YoyConfig::from_env()?;
    let source = EdgarSource::new(config)?;

    let request = RunRequest {
        ticker: Ticker::new(opt.ticker)?,
        year: opt.year,
        quarter: opt.quarter,
        full_year: opt.full_year,
    };
    let settings = MatchSettings {
        fuzzy_accept: opt.fuzzy_accept,
        ..MatchSettings::default()
    };

    let report = recon::run(&source, &request, &settings).await?;

    let csv_path = write_report(&report, &opt.output_dir)?;
    let metrics_path = opt.output_dir.join(format!(
        "{}_{}_summary_metrics.json",
        report.target.ticker, report.target.label
    ));
    report.metrics.write_to(&metrics_path)?;

    println!(
        "{} {} | period end {} | accession {}",
        report.target.ticker, report.target.label, report.target.period_end, report.target.accession
    );
    println!("{} matched rows -> {}", report.rows.len(), csv_path.display());
    println!("metrics -> {}", metrics_path.display());

    match report.status() {
        RunStatus::Success => println!("clean run: no advisories"),
        RunStatus::SuccessWithCaveats => {
            let a = &report.advisories;
            println!(
                "completed with caveats: {} collision-flagged rows, {} unmatched tags, {} fuzzy near-misses",
                a.collision_rows,
                a.missing_tags.len(),
                a.near_misses.len()
            );
        }
    }

    Ok(())
}
