//! Trending report CLI
//!
//! Fetches a GA4 page report and prints it as JSON.

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ga4_trending::config::Config;
use ga4_trending::nodes::{source_nodes, JsonLinesSink};
use ga4_trending::report::get_report_with;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    /// JSON array of `{path, value}` records
    Report,
    /// One page views node per line
    Nodes,
}

#[derive(Parser, Debug)]
#[command(name = "ga4-trending")]
#[command(author, version, about = "Trending pages from Google Analytics", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Report)]
    output: Output,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;
    init_tracing(args.debug || config.debug);

    tracing::debug!(
        config_file = %args.config,
        property = config.report.property.as_deref().unwrap_or("N/A"),
        api_base_url = %config.api_base_url,
        "configuration loaded"
    );

    match args.output {
        Output::Report => {
            let reports = get_report_with(&config).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Output::Nodes => {
            let mut sink = JsonLinesSink::new(std::io::stdout().lock());
            let count = source_nodes(&config, &mut sink).await;
            tracing::info!(count, "page views nodes created");
        }
    }

    Ok(())
}
