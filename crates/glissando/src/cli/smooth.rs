use crate::{
    config::Config,
    document::{load_trajectory, smoothed_path, write_trajectory},
};
use anyhow::{Context, Result};
use clap::Args;
use glissando_core::{JerkLimitedOtg, SmoothingReport, Smoother, smooth_with_extension};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct SmoothArgs {
    /// Path to the input trajectory (TOML or JSON).
    pub input: PathBuf,

    /// Path to a configuration file (TOML or JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path where the smoothed trajectory will be written.
    ///
    /// Defaults to the input file name with a `smoothed.json` extension.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Fraction of each joint's velocity limit to use, in (0, 1].
    #[arg(long)]
    pub velocity_scale: Option<f64>,

    /// Fraction of each joint's acceleration limit to use, in (0, 1].
    #[arg(long)]
    pub acceleration_scale: Option<f64>,

    /// Generator step duration in seconds.
    ///
    /// Defaults to the input's average waypoint spacing.
    #[arg(long)]
    pub step_duration: Option<f64>,

    /// Fail on lagging motion instead of retrying with longer steps.
    #[arg(long)]
    pub no_retry: bool,
}

impl SmoothArgs {
    pub fn run(&self) -> Result<()> {
        let (output, report) = self.execute()?;
        println!(
            "Wrote smoothed trajectory to {} ({} generator steps, {} duplicates, {:.3} s)",
            output.display(),
            report.solver_calls,
            report.skipped_duplicates,
            report.duration
        );
        Ok(())
    }

    /// Smooths the input and writes the result, returning where it went.
    pub fn execute(&self) -> Result<(PathBuf, SmoothingReport)> {
        let config = self.config()?;
        let mut trajectory = load_trajectory(&self.input)?;

        tracing::info!(
            input = %self.input.display(),
            waypoints = trajectory.len(),
            "smoothing trajectory"
        );

        let mut smoother = Smoother::new(JerkLimitedOtg::new(config.generator), config.smoothing);
        let scaling = config.scaling();
        let report = if config.retry.enabled {
            smooth_with_extension(&mut smoother, &mut trajectory, scaling, config.retry.extension())
        } else {
            smoother.apply(&mut trajectory, scaling)
        }
        .with_context(|| format!("failed to smooth {}", self.input.display()))?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| smoothed_path(&self.input));
        write_trajectory(&output, &trajectory)?;
        Ok((output, report))
    }

    /// The configuration file, if any, with command-line overrides applied.
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(scale) = self.velocity_scale {
            config.scaling.velocity = scale;
        }
        if let Some(scale) = self.acceleration_scale {
            config.scaling.acceleration = scale;
        }
        if let Some(step) = self.step_duration {
            config.smoothing.step_duration = Some(step);
        }
        if self.no_retry {
            config.retry.enabled = false;
        }
        config.validate()?;
        Ok(config)
    }
}
