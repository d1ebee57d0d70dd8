use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use std::process;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "config/starschema.toml";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let summary = starschema::run_star_schema_pipeline(config_path)
        .await
        .with_context(|| format!("star schema run with config {} failed", config_path))?;

    for table in &summary.tables {
        info!(
            table = %table.table,
            rows = table.rows,
            location = %table.location,
            "Table written"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = Command::new("Star Schema Pipeline")
        .version("1.0")
        .about("Builds the songplays star schema from song and log JSON")
        .subcommand(
            Command::new("run")
                .about("Run the song/log JSON to Parquet pipeline")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                )
                .arg(
                    Arg::new("json-logs")
                        .long("json-logs")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            init_tracing(run_matches.get_flag("json-logs"));

            let config_path = run_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_CONFIG);
            info!(config = config_path, "Starting star schema pipeline");

            if let Err(e) = run(config_path).await {
                error!("{:#}", e);
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Please specify a valid subcommand. Use --help for usage information.");
            process::exit(1);
        }
    }
}
