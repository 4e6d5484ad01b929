// src/core/plan.rs: Sweep enumeration, candidate counts and phyng placement

use crate::infra::config::{Config, PhyngTemplate};

use super::types::ActuatorKind;

/// Phyngs are spread along x.
const SPREAD_AXIS: usize = 0;

/// Tolerance so 3.0 / 0.75 floors to 4, not 3.
const FIT_EPSILON: f64 = 1e-9;

/// Which phyng counts to try for one (mesh, cores, type) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    /// Every step up to the feasible maximum.
    Full,
    /// Only the feasible maximum.
    TakeMost,
    /// Only the first step.
    TakeLeast,
}

impl CountMode {
    pub fn from_flags(take_most: bool, take_least: bool) -> Self {
        if take_most {
            CountMode::TakeMost
        } else if take_least {
            CountMode::TakeLeast
        } else {
            CountMode::Full
        }
    }
}

/// Where one phyng goes, with its paired inlet/outlet if it has them.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub location: [f64; 3],
    pub location_in: Option<[f64; 3]>,
    pub location_out: Option<[f64; 3]>,
}

/// Round to two decimals; the geometry engine rejects longer fractions.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Largest number of phyngs that fit side by side along the wall, capped by `target`.
///
/// Each phyng occupies its own footprint plus the baseline offset, so the bound is
/// `floor(wall_span / (footprint + offset))`.
pub fn feasible_max(wall_span: f64, footprint: f64, offset: f64, target: u32) -> u32 {
    let pitch = footprint + offset;
    if pitch <= 0.0 {
        return target;
    }
    if wall_span <= 0.0 {
        return 0;
    }
    let fits = (wall_span / pitch + FIT_EPSILON).floor();
    if fits >= target as f64 {
        target
    } else {
        fits as u32
    }
}

/// Feasible maximum for a phyng template inside the configured walls.
pub fn template_max(walls: &PhyngTemplate, template: &PhyngTemplate, target: u32) -> u32 {
    feasible_max(
        walls.dimensions[SPREAD_AXIS],
        template.dimensions[SPREAD_AXIS],
        template.location[SPREAD_AXIS],
        target,
    )
}

/// Ascending phyng counts to evaluate.
///
/// `TakeMost` with nothing feasible yields no candidates instead of a negative start.
pub fn candidate_counts(step: u32, max: u32, mode: CountMode) -> Vec<u32> {
    let step = step.max(1);
    match mode {
        CountMode::Full => (step..=max).step_by(step as usize).collect(),
        CountMode::TakeMost if max > 0 => vec![max],
        CountMode::TakeLeast if step <= max => vec![step],
        _ => Vec::new(),
    }
}

/// Locations for `count` copies of a template, spaced by footprint plus offset.
pub fn phyng_placements(template: &PhyngTemplate, count: u32) -> Vec<Placement> {
    let base = template.location[SPREAD_AXIS];
    let pitch = template.dimensions[SPREAD_AXIS] + base;

    (0..count)
        .map(|i| {
            let x = round2(base + i as f64 * pitch);
            let delta = x - base;
            Placement {
                location: shift(template.location, delta),
                location_in: template.location_in.map(|l| shift(l, delta)),
                location_out: template.location_out.map(|l| shift(l, delta)),
            }
        })
        .collect()
}

fn shift(mut location: [f64; 3], delta: f64) -> [f64; 3] {
    location[SPREAD_AXIS] = round2(location[SPREAD_AXIS] + delta);
    location
}

pub fn case_name(mesh: u32, cores: u32, kind: ActuatorKind, count: u32) -> String {
    format!("m{mesh}c{cores}ph{}{count}", kind.initial())
}

pub fn combined_case_name(mesh: u32, cores: u32) -> String {
    format!("m{mesh}c{cores}all")
}

/// Mesh qualities to sweep. The first value is `start` as given; later values
/// land on multiples of `step` so a resumed sweep rejoins the regular grid.
pub fn mesh_values(start: u32, max: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut values = Vec::new();
    let mut mesh = start;
    while mesh <= max {
        values.push(mesh);
        match (mesh / step).checked_add(1).and_then(|n| n.checked_mul(step)) {
            Some(next) => mesh = next,
            None => break,
        }
    }
    values
}

/// Core counts to sweep; a computed 0 means a serial run on 1 core.
///
/// When the sequence starts `0, 1, ..` both map to 1; the repeat is dropped on
/// purpose so the serial cell runs once.
pub fn core_values(start: u32, max: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut values: Vec<u32> = (start..=max.max(start))
        .step_by(step as usize)
        .map(|c| c.max(1))
        .collect();
    values.dedup();
    values
}

/// One (mesh, cores, type) cell of the sweep with the counts it would try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCell {
    pub mesh: u32,
    pub cores: u32,
    pub kind: ActuatorKind,
    pub counts: Vec<u32>,
}

/// Everything a sweep would attempt, before plateau pruning.
pub fn sweep_plan(config: &Config) -> Vec<PlanCell> {
    let sweep = &config.sweep;
    let mode = CountMode::from_flags(sweep.take_most, sweep.take_least);
    let kinds = config.actuators.enabled();

    let mut cells = Vec::new();
    for mesh in mesh_values(sweep.start_mesh, sweep.max_mesh, sweep.mesh_step) {
        for cores in core_values(sweep.start_cores, sweep.max_cores, sweep.cores_step) {
            for &kind in &kinds {
                cells.push(PlanCell {
                    mesh,
                    cores,
                    kind,
                    counts: kind_counts(config, kind, mode),
                });
            }
        }
    }
    cells
}

/// Candidate counts for one type under the configured walls and mode.
pub fn kind_counts(config: &Config, kind: ActuatorKind, mode: CountMode) -> Vec<u32> {
    let settings = config.actuators.get(kind);
    let max = template_max(
        &config.templates.walls,
        config.templates.phyng(kind),
        settings.target,
    );
    candidate_counts(settings.step, max, mode)
}
