// src/cli/run.rs: `wopbench run`, the default command

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::sink::CsvSink;
use crate::core::sweep::Sweep;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::simulator::http::HttpSimulator;

use super::progress::ProgressSink;
use super::RunArgs;

/// Layer the config: file, then `.env` and `WOP_*` variables, then flags.
pub fn resolve_config(
    config_path: Option<&str>,
    url: Option<&str>,
    args: &RunArgs,
) -> anyhow::Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };
    config.apply_env()?;
    args.apply(&mut config);
    if let Some(url) = url {
        config.simulator.url = url.to_string();
    }
    Ok(config)
}

pub fn connect(config: &Config) -> anyhow::Result<HttpSimulator> {
    let timeout = config
        .simulator
        .request_timeout_secs
        .map(Duration::from_secs);
    Ok(HttpSimulator::new(&config.simulator.url, timeout)?)
}

pub fn output_dir(config: &Config) -> PathBuf {
    config
        .output
        .dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(paths::results_dir)
}

pub async fn run_sweep(config: Config, quiet: bool) -> anyhow::Result<()> {
    // Fail on a bad config before creating the results file.
    config.validate()?;

    let sim = connect(&config)?;
    let csv = CsvSink::create(&output_dir(&config), &config.output.prefix)?;
    let path = csv.path().to_path_buf();
    eprintln!("Simulator: {}", sim.base_url());
    eprintln!("Results:   {}", path.display());

    let mut sink = ProgressSink::new(csv, quiet);
    let sweep = Sweep::new(Arc::new(sim), config);
    let summary = sweep.run(&mut sink).await?;

    println!(
        "{} trial(s), {} failed, {} retried, {} plateau(s), {} count(s) skipped",
        summary.trials, summary.failures, summary.retries, summary.plateaus, summary.skipped,
    );
    println!("{}", path.display());
    Ok(())
}
