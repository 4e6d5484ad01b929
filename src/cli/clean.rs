// src/cli/clean.rs: `wopbench clean`, delete every case on the simulator

use crate::core::sweep::clean_stale_cases;
use crate::infra::config::Config;

use super::run::connect;

pub async fn run_clean(config: &Config) -> anyhow::Result<()> {
    let sim = connect(config)?;
    let removed = clean_stale_cases(&sim).await?;
    println!("Removed {removed} case(s) from {}", sim.base_url());
    Ok(())
}
