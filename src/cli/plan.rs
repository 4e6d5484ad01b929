// src/cli/plan.rs: `wopbench plan`, print the sweep without running it

use crate::core::plan::{self, PlanCell};
use crate::infra::config::Config;

pub fn show_plan(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    let cells = plan::sweep_plan(config);
    if config.sweep.all_in_one {
        println!("Mode: all-in-one (one case per mesh/cores cell)");
    }
    println!("{:<6} {:<6} {:<8} COUNTS", "MESH", "CORES", "TYPE");
    for cell in &cells {
        println!("{}", plan_line(cell));
    }

    let trials: usize = if config.sweep.all_in_one {
        let mut pairs: Vec<(u32, u32)> = cells.iter().map(|c| (c.mesh, c.cores)).collect();
        pairs.dedup();
        pairs.len()
    } else {
        cells.iter().map(|c| c.counts.len()).sum()
    };
    println!("\nAt most {trials} trial(s) before plateau pruning.");
    Ok(())
}

pub fn plan_line(cell: &PlanCell) -> String {
    let counts = if cell.counts.is_empty() {
        "-".to_string()
    } else {
        cell.counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "{:<6} {:<6} {:<8} {}",
        cell.mesh,
        cell.cores,
        cell.kind.as_str(),
        counts
    )
}
