// src/cli/mod.rs: CLI definition (clap derive)

pub mod clean;
pub mod plan;
pub mod progress;
pub mod run;

use clap::{Args, Parser, Subcommand};

use crate::infra::config::Config;

#[derive(Parser)]
#[command(
    name = "wopbench",
    about = "Sweep a Web of Phyngs simulator over mesh, cores and actuators",
    version,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Simulator base URL (overrides config and WOP_SIMULATOR_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sweep (default)
    Run(RunArgs),
    /// Print the cells and phyng counts a sweep would try, without contacting the simulator
    Plan(RunArgs),
    /// Delete every case on the simulator
    Clean,
}

/// Flags that override the sweep section of the config.
#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Results directory
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Whole-trial retries per phyng count
    #[arg(long)]
    pub retries: Option<u32>,

    /// Only evaluate the largest feasible count of each type
    #[arg(long, conflicts_with = "take_least")]
    pub take_most: bool,

    /// Only evaluate the first count of each type
    #[arg(long)]
    pub take_least: bool,

    /// Populate every enabled type into one case per mesh/cores cell
    #[arg(long)]
    pub all_in_one: bool,

    /// Keep cases already on the simulator instead of deleting them at start
    #[arg(long)]
    pub no_clean: bool,

    /// Suppress per-trial progress lines
    #[arg(long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Apply flags on top of a loaded config. Flags only ever switch modes on.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.dir = Some(dir.clone());
        }
        if let Some(retries) = self.retries {
            config.sweep.retries = retries;
        }
        if self.take_most {
            config.sweep.take_most = true;
        }
        if self.take_least {
            config.sweep.take_least = true;
        }
        if self.all_in_one {
            config.sweep.all_in_one = true;
        }
        if self.no_clean {
            config.sweep.clean_stale = false;
        }
    }
}
