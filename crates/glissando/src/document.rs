//! Reading and writing trajectory files.

use anyhow::{Context, Result};
use glissando_core::Trajectory;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Load a trajectory, auto-detecting TOML or JSON format
pub fn load_trajectory(path: &Path) -> Result<Trajectory> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read trajectory {}", path.display()))?;

    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => from_toml(&content),
        Some("json") => from_json(&content),
        _ => from_json(&content).or_else(|_| from_toml(&content)),
    };
    parsed.with_context(|| format!("invalid trajectory {}", path.display()))
}

fn from_toml(content: &str) -> Result<Trajectory> {
    toml::from_str(content).context("failed to parse trajectory as TOML")
}

fn from_json(content: &str) -> Result<Trajectory> {
    serde_json::from_str(content).context("failed to parse trajectory as JSON")
}

/// Write `trajectory` as pretty-printed JSON, creating parent directories.
pub fn write_trajectory(path: &Path, trajectory: &Trajectory) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(trajectory).context("failed to encode trajectory")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// `dir/name.ext` becomes `dir/name.smoothed.json`.
pub fn smoothed_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trajectory".to_string());
    input.with_file_name(format!("{stem}.smoothed.json"))
}
