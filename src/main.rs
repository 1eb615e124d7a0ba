use clap::Parser;
use strike_edge::cli::{Cli, Commands};
use strike_edge::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing or invalid configuration aborts startup; everything
    // downstream assumes a fully-validated config.
    let config = Config::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", cli.config, e))?;

    strike_edge::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Feed: {} every {}ms", config.feed.symbol, config.feed.poll_interval_ms);
            println!(
                "  Series 5m: prefix={} min_hold={}s",
                config.series.five_min.slug_prefix, config.series.five_min.min_hold_secs
            );
            println!(
                "  Series 15m: prefix={} min_hold={}s",
                config.series.fifteen_min.slug_prefix, config.series.fifteen_min.min_hold_secs
            );
            println!(
                "  Signal: edge_threshold={}bps cooldown={}s",
                config.signal.edge_threshold_bps, config.signal.cooldown_secs
            );
            println!(
                "  Risk: stop_loss=${} take_profit=${} max_loss=${}",
                config.risk.stop_loss_usd, config.risk.take_profit_usd, config.risk.max_cumulative_loss_usd
            );
            println!("  Execution: size=${} (paper)", config.execution.position_size_usd);
        }
    }

    Ok(())
}
