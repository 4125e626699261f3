use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use hostwatch_service::App;
use hostwatch_service::config::Config;
use hostwatch_service::monitoring::{HttpNotifier, IcmpProber};

/// Host availability monitor.
#[derive(Parser, Debug)]
#[command(name = "hostwatch", version, about)]
struct Cli {
    /// Path to the TOML config file (created with defaults if missing).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("loading configuration")?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let prober = Arc::new(IcmpProber::new().context("ICMP probing needs raw socket privileges")?);
    let notifier = Arc::new(HttpNotifier::new(config.sms.timeout_seconds)?);

    let app = App::build(&config, prober, notifier).await?;
    tracing::info!(addr = %app.local_addr()?, "hostwatch started");
    app.run().await
}
