use anyhow::{Context, Result};
use glissando_core::{
    DurationExtension, GeneratorConfig, Scaling, SmoothingConfig,
    retry::{DEFAULT_EXTENSION_FACTOR, DEFAULT_MAX_ATTEMPTS},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Settings for a smoothing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Smoothing loop configuration
    #[serde(default)]
    pub smoothing: SmoothingConfig,

    /// Velocity and acceleration scaling
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Step duration extension on lagging motion
    #[serde(default)]
    pub retry: RetryConfig,

    /// Built-in generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingConfig {
    #[serde(default = "default_scale")]
    pub velocity: f64,

    #[serde(default = "default_scale")]
    pub acceleration: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            velocity: default_scale(),
            acceleration: default_scale(),
        }
    }
}

impl From<ScalingConfig> for Scaling {
    fn from(config: ScalingConfig) -> Self {
        Scaling::new(config.velocity, config.acceleration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry lagging passes with a longer step duration
    #[serde(default = "default_retry_enabled")]
    pub enabled: bool,

    /// Multiplier applied to the step duration per retry
    #[serde(default = "default_retry_factor")]
    pub factor: f64,

    /// Passes before giving up, including the first
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_retry_enabled(),
            factor: default_retry_factor(),
            max_attempts: default_retry_attempts(),
        }
    }
}

impl RetryConfig {
    pub fn extension(&self) -> DurationExtension {
        DurationExtension {
            factor: self.factor,
            max_attempts: self.max_attempts,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_retry_enabled() -> bool {
    true
}

fn default_retry_factor() -> f64 {
    DEFAULT_EXTENSION_FACTOR
}

fn default_retry_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

impl Config {
    /// Load configuration from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config as TOML")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse config as JSON")
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling.into()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.smoothing.step_duration {
            Some(step) if !(step.is_finite() && step > 0.0) => {
                anyhow::bail!("smoothing.step_duration must be positive, got {step}");
            }
            _ => {}
        }
        let tolerance = self.smoothing.duplicate_tolerance;
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            anyhow::bail!("smoothing.duplicate_tolerance must be non-negative, got {tolerance}");
        }
        let lag = &self.smoothing.lag;
        if !(lag.min_target_speed.is_finite() && lag.min_target_speed >= 0.0) {
            anyhow::bail!(
                "smoothing.lag.min_target_speed must be non-negative, got {}",
                lag.min_target_speed
            );
        }
        if !(0.0..1.0).contains(&lag.tolerance) {
            anyhow::bail!("smoothing.lag.tolerance must lie in [0, 1), got {}", lag.tolerance);
        }

        self.scaling().validate().context("invalid [scaling]")?;

        if self.retry.enabled && !self.retry.extension().is_valid() {
            anyhow::bail!(
                "retry needs factor > 1 and at least one attempt, got factor {} with {} attempts",
                self.retry.factor,
                self.retry.max_attempts
            );
        }

        self.generator.validate().context("invalid [generator]")?;
        Ok(())
    }
}
