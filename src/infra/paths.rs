// src/infra/paths.rs: Config and results locations
//
// All paths respect the WOPBENCH_HOME environment variable for isolation.
// When WOPBENCH_HOME is set, config and results live under that directory.
// When unset, config uses ~/.wopbench/ and results use XDG_DATA_HOME/wopbench/results.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the WOPBENCH_HOME override, if set.
fn wopbench_home() -> Option<PathBuf> {
    std::env::var_os("WOPBENCH_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $WOPBENCH_HOME/ or ~/.wopbench/
pub fn config_dir() -> PathBuf {
    if let Some(home) = wopbench_home() {
        return home;
    }
    dirs_home().join(".wopbench")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default results directory: $WOPBENCH_HOME/results/ or XDG_DATA_HOME/wopbench/results
pub fn results_dir() -> PathBuf {
    if let Some(home) = wopbench_home() {
        return home.join("results");
    }
    ProjectDirs::from("", "", "wopbench")
        .map(|p| p.data_local_dir().join("results"))
        .unwrap_or_else(|| PathBuf::from("results"))
}
