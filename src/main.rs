// src/main.rs: wopbench entry point

use clap::Parser;

use wopbench::cli::{clean, plan, run as run_cmd, Cli, Commands};
use wopbench::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let url = cli.url.as_deref();

    match &cli.command {
        Some(Commands::Run(args)) => {
            let config = run_cmd::resolve_config(config_path, url, args)?;
            run_cmd::run_sweep(config, args.quiet).await
        }
        Some(Commands::Plan(args)) => {
            let config = run_cmd::resolve_config(config_path, url, args)?;
            plan::show_plan(&config)
        }
        Some(Commands::Clean) => {
            let config = run_cmd::resolve_config(config_path, url, &cli.run)?;
            clean::run_clean(&config).await
        }
        None => {
            let config = run_cmd::resolve_config(config_path, url, &cli.run)?;
            run_cmd::run_sweep(config, cli.run.quiet).await
        }
    }
}
