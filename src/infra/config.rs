// src/infra/config.rs: Configuration loading (TOML file, then environment)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::types::ActuatorKind;
use crate::infra::errors::SweepError;
use crate::infra::paths;
use crate::simulator::PropertyValue;

/// Mesh quality is a percentage on the simulator side.
pub const MAX_MESH_QUALITY: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub actuators: ActuatorsConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub url: String,
    /// Per-request timeout; solves can run for minutes, so unset by default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".into(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub mesh_step: u32,
    pub start_mesh: u32,
    pub max_mesh: u32,
    pub cores_step: u32,
    pub start_cores: u32,
    pub max_cores: u32,
    /// Whole-trial retries per phyng count.
    pub retries: u32,
    /// Setup attempts beyond the first, each preceded by a clean.
    pub setup_retries: u32,
    pub take_most: bool,
    pub take_least: bool,
    pub all_in_one: bool,
    pub clean_stale: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mesh_step: 10,
            start_mesh: 10,
            max_mesh: 50,
            cores_step: 2,
            start_cores: 0,
            max_cores: 4,
            retries: 2,
            setup_retries: 2,
            take_most: false,
            take_least: false,
            all_in_one: false,
            clean_stale: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSettings {
    /// Largest count to grow to; 0 disables the type.
    pub target: u32,
    pub step: u32,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self { target: 0, step: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActuatorsConfig {
    #[serde(default)]
    pub heaters: ActuatorSettings,
    #[serde(default)]
    pub acs: ActuatorSettings,
    #[serde(default)]
    pub windows: ActuatorSettings,
    #[serde(default)]
    pub doors: ActuatorSettings,
}

impl ActuatorsConfig {
    pub fn get(&self, kind: ActuatorKind) -> &ActuatorSettings {
        match kind {
            ActuatorKind::Heaters => &self.heaters,
            ActuatorKind::Acs => &self.acs,
            ActuatorKind::Windows => &self.windows,
            ActuatorKind::Doors => &self.doors,
        }
    }

    pub fn get_mut(&mut self, kind: ActuatorKind) -> &mut ActuatorSettings {
        match kind {
            ActuatorKind::Heaters => &mut self.heaters,
            ActuatorKind::Acs => &mut self.acs,
            ActuatorKind::Windows => &mut self.windows,
            ActuatorKind::Doors => &mut self.doors,
        }
    }

    /// Types with a nonzero target, in sweep order.
    pub fn enabled(&self) -> Vec<ActuatorKind> {
        ActuatorKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).target > 0)
            .collect()
    }
}

/// Minimum spacing between remote calls, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub after_create_ms: u64,
    pub after_phyng_ms: u64,
    pub after_write_ms: u64,
    pub after_outcome_ms: u64,
    pub setup_clean_ms: u64,
    /// First delay between whole-trial retries; doubles per retry.
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_create_ms: 1_000,
            after_phyng_ms: 500,
            after_write_ms: 100,
            after_outcome_ms: 3_000,
            setup_clean_ms: 1_000,
            retry_initial_ms: 2_000,
            retry_max_ms: 30_000,
        }
    }
}

impl PacingConfig {
    /// No delays at all; used by tests and dry runs.
    pub fn none() -> Self {
        Self {
            after_create_ms: 0,
            after_phyng_ms: 0,
            after_write_ms: 0,
            after_outcome_ms: 0,
            setup_clean_ms: 0,
            retry_initial_ms: 0,
            retry_max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Results directory; defaults to the data directory.
    pub dir: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "sweep".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseTemplate {
    #[serde(rename = "type")]
    pub case_type: String,
    pub background: String,
    pub clean_limit: u32,
}

impl Default for CaseTemplate {
    fn default() -> Self {
        Self {
            case_type: "cht_room".into(),
            background: "fluid".into(),
            clean_limit: 0,
        }
    }
}

/// Geometry and operating defaults for one phyng type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhyngTemplate {
    pub dimensions: [f64; 3],
    #[serde(default)]
    pub location: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub dimensions_in: Option<[f64; 3]>,
    #[serde(default)]
    pub location_in: Option<[f64; 3]>,
    #[serde(default)]
    pub dimensions_out: Option<[f64; 3]>,
    #[serde(default)]
    pub location_out: Option<[f64; 3]>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub velocity: Option<PropertyValue>,
}

impl PhyngTemplate {
    fn plain(dimensions: [f64; 3], location: [f64; 3]) -> Self {
        Self {
            dimensions,
            location,
            rotation: [0.0; 3],
            material: None,
            dimensions_in: None,
            location_in: None,
            dimensions_out: None,
            location_out: None,
            temperature: None,
            velocity: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub case: CaseTemplate,
    /// Bounding walls; their x span limits how many phyngs fit side by side.
    pub walls: PhyngTemplate,
    pub heater: PhyngTemplate,
    pub ac: PhyngTemplate,
    pub window: PhyngTemplate,
    pub door: PhyngTemplate,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            case: CaseTemplate::default(),
            walls: PhyngTemplate::plain([3.0, 4.0, 2.5], [0.0, 0.0, 0.0]),
            heater: PhyngTemplate {
                material: Some("copper".into()),
                temperature: Some(330.0),
                ..PhyngTemplate::plain([0.4, 0.1, 0.6], [0.2, 0.1, 0.2])
            },
            ac: PhyngTemplate {
                dimensions_in: Some([0.5, 0.0, 0.1]),
                location_in: Some([0.2, 3.6, 2.0]),
                dimensions_out: Some([0.5, 0.0, 0.1]),
                location_out: Some([0.2, 3.6, 2.2]),
                temperature: Some(290.0),
                velocity: Some(PropertyValue::Scalar(1.0)),
                ..PhyngTemplate::plain([0.5, 0.2, 0.3], [0.2, 3.6, 2.0])
            },
            window: PhyngTemplate {
                temperature: Some(283.15),
                velocity: Some(PropertyValue::Vector([0.0, 0.5, 0.0])),
                ..PhyngTemplate::plain([0.5, 0.0, 0.6], [0.2, 0.0, 1.0])
            },
            door: PhyngTemplate {
                temperature: Some(293.15),
                velocity: Some(PropertyValue::Vector([0.0, -0.5, 0.0])),
                ..PhyngTemplate::plain([0.6, 0.0, 1.9], [0.2, 4.0, 0.0])
            },
        }
    }
}

impl TemplatesConfig {
    pub fn phyng(&self, kind: ActuatorKind) -> &PhyngTemplate {
        match kind {
            ActuatorKind::Heaters => &self.heater,
            ActuatorKind::Acs => &self.ac,
            ActuatorKind::Windows => &self.window,
            ActuatorKind::Doors => &self.door,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay `WOP_*` variables from the process environment (after `.env`).
    pub fn apply_env(&mut self) -> Result<(), SweepError> {
        dotenvy::dotenv().ok();
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from any key lookup. Unset keys leave the current value.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SweepError> {
        if let Some(url) = lookup("WOP_SIMULATOR_URL") {
            self.simulator.url = url;
        }

        let sweep = &mut self.sweep;
        override_parsed(&lookup, "WOP_MESH_STEP", &mut sweep.mesh_step)?;
        override_parsed(&lookup, "WOP_START_MESH", &mut sweep.start_mesh)?;
        override_parsed(&lookup, "WOP_MAX_MESH", &mut sweep.max_mesh)?;
        override_parsed(&lookup, "WOP_CORES_STEP", &mut sweep.cores_step)?;
        override_parsed(&lookup, "WOP_START_CORES", &mut sweep.start_cores)?;
        override_parsed(&lookup, "WOP_MAX_CORES", &mut sweep.max_cores)?;
        override_parsed(&lookup, "WOP_RETRIES", &mut sweep.retries)?;
        override_parsed(&lookup, "WOP_SETUP_RETRIES", &mut sweep.setup_retries)?;
        override_flag(&lookup, "WOP_TAKE_MOST", &mut sweep.take_most)?;
        override_flag(&lookup, "WOP_TAKE_LEAST", &mut sweep.take_least)?;
        override_flag(&lookup, "WOP_ALL_IN_ONE", &mut sweep.all_in_one)?;

        for kind in ActuatorKind::ALL {
            let key = kind.as_str().to_ascii_uppercase();
            let settings = self.actuators.get_mut(kind);
            override_parsed(&lookup, &format!("WOP_{key}"), &mut settings.target)?;
            override_parsed(&lookup, &format!("WOP_{key}_STEP"), &mut settings.step)?;
        }

        if let Some(dir) = lookup("WOP_OUTPUT_DIR") {
            self.output.dir = Some(dir);
        }
        if let Some(prefix) = lookup("WOP_OUTPUT_PREFIX") {
            self.output.prefix = prefix;
        }
        Ok(())
    }

    /// Reject configurations that cannot run. Called before any remote call.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.actuators.enabled().is_empty() {
            return Err(SweepError::NoActuatorSelected);
        }

        let s = &self.sweep;
        if s.mesh_step == 0 || s.cores_step == 0 {
            return Err(SweepError::Config(
                "mesh_step and cores_step must be at least 1".into(),
            ));
        }
        if s.max_mesh > MAX_MESH_QUALITY {
            return Err(SweepError::Config(format!(
                "max_mesh {} exceeds {MAX_MESH_QUALITY}",
                s.max_mesh
            )));
        }
        if s.start_mesh > s.max_mesh {
            return Err(SweepError::Config(format!(
                "start_mesh {} exceeds max_mesh {}",
                s.start_mesh, s.max_mesh
            )));
        }
        if s.start_cores > s.max_cores.max(1) {
            return Err(SweepError::Config(format!(
                "start_cores {} exceeds max_cores {}",
                s.start_cores, s.max_cores
            )));
        }
        if s.take_most && s.take_least {
            return Err(SweepError::Config(
                "take_most and take_least are mutually exclusive".into(),
            ));
        }

        for kind in self.actuators.enabled() {
            if self.actuators.get(kind).step == 0 {
                return Err(SweepError::Config(format!("{kind} step must be at least 1")));
            }
        }

        url::Url::parse(&self.simulator.url).map_err(|e| {
            SweepError::Config(format!("invalid simulator url '{}': {e}", self.simulator.url))
        })?;
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<(), SweepError>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| SweepError::Config(format!("{key}={raw:?}: {e}")))?;
    }
    Ok(())
}

fn override_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut bool,
) -> Result<(), SweepError> {
    if let Some(raw) = lookup(key) {
        *target = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => return Err(SweepError::Config(format!("{key}={raw:?}: expected a boolean"))),
        };
    }
    Ok(())
}
