use crate::document::load_trajectory;
use anyhow::{Context, Result};
use clap::Args;
use glissando_core::{LimitSet, Scaling, Trajectory};
use std::{fmt, path::PathBuf};

#[derive(Args, Debug, Default)]
pub struct InspectArgs {
    /// Path to the trajectory (TOML or JSON).
    pub input: PathBuf,
}

impl InspectArgs {
    pub fn run(&self) -> Result<()> {
        let trajectory = load_trajectory(&self.input)?;
        let summary = Summary::of(&trajectory)
            .with_context(|| format!("cannot inspect {}", self.input.display()))?;
        print!("{summary}");
        Ok(())
    }
}

/// Peak motion of one joint next to its unscaled limits.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSummary {
    pub name: String,
    pub peak_velocity: f64,
    pub max_velocity: f64,
    pub peak_acceleration: f64,
    pub max_acceleration: f64,
}

impl JointSummary {
    pub fn within_limits(&self) -> bool {
        self.peak_velocity <= self.max_velocity && self.peak_acceleration <= self.max_acceleration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub group: String,
    pub waypoints: usize,
    pub duration: f64,
    pub joints: Vec<JointSummary>,
}

impl Summary {
    pub fn of(trajectory: &Trajectory) -> Result<Self> {
        trajectory.validate()?;
        let limits = LimitSet::from_group(trajectory.group(), Scaling::default())?;
        let velocities = trajectory.peak_velocities();
        let accelerations = trajectory.peak_accelerations();

        let joints = trajectory
            .group()
            .joints
            .iter()
            .enumerate()
            .map(|(i, joint)| JointSummary {
                name: joint.name.clone(),
                peak_velocity: velocities[i],
                max_velocity: limits.max_velocity[i],
                peak_acceleration: accelerations[i],
                max_acceleration: limits.max_acceleration[i],
            })
            .collect();

        Ok(Self {
            group: trajectory.group().name.clone(),
            waypoints: trajectory.len(),
            duration: trajectory.duration(),
            joints,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "group {}: {} waypoints over {:.3} s",
            self.group, self.waypoints, self.duration
        )?;
        writeln!(
            f,
            "{:<16} {:>10} {:>10} {:>10} {:>10}",
            "joint", "peak vel", "max vel", "peak acc", "max acc"
        )?;
        for joint in &self.joints {
            let flag = if joint.within_limits() { "" } else { "  over limit" };
            writeln!(
                f,
                "{:<16} {:>10.4} {:>10.4} {:>10.4} {:>10.4}{flag}",
                joint.name,
                joint.peak_velocity,
                joint.max_velocity,
                joint.peak_acceleration,
                joint.max_acceleration
            )?;
        }
        Ok(())
    }
}
