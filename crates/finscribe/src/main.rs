use anyhow::{Context, Result};
use clap::Parser;
use finscribe_models::config::FinscribeConfig;
use finscribe_models::telemetry::format_uptime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "finscribe", about = "Two-agent financial analysis and strategic report")]
struct Cli {
    /// Ticker or free-form request, e.g. "AAPL" or "Analyse TSLA"
    input: String,

    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Single attempt, no retries and no fallback report
    #[arg(long)]
    no_fallback: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => finscribe::load_config(path)?,
        None => FinscribeConfig::default(),
    };
    finscribe::init_tracing(&config.logging);

    let workflow = finscribe::build_workflow(&config).context("Failed to build workflow")?;

    let cancel = workflow.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling analysis");
            cancel.cancel();
        }
    });

    let result = if cli.no_fallback {
        workflow.execute(&cli.input).await
    } else {
        workflow.execute_with_fallback(&cli.input).await
    };

    // Output result as JSON to stdout
    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    info!(
        uptime = %format_uptime(workflow.metrics().uptime().as_secs_f64()),
        success = result.success,
        degraded = result.degraded,
        "Done"
    );

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
