//! Run configuration: tempo, bifurcation sweep, Hénon orbits and seed.
//!
//! One immutable `RunConfig` is handed to the coordinator. Defaults match the
//! reference performance (120 BPM, 960 ticks per beat, 10 notes per second).
//! Stored as JSON; missing fields fall back to their defaults.

use crate::error::{Error, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tempo {
    pub bpm: f64,
    pub ticks_per_beat: u16,
    /// Notes emitted per second of music
    pub iterations_per_second: f64,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ticks_per_beat: 960,
            iterations_per_second: 10.0,
        }
    }
}

impl Tempo {
    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_beat as f64 * self.bpm / 60.0
    }

    /// Length of one note in recording ticks.
    pub fn note_duration_ticks(&self) -> u32 {
        (self.ticks_per_second() / self.iterations_per_second).floor() as u32
    }

    /// Length of one note in wall-clock time. Saturates for rates that
    /// `validate` rejects.
    pub fn note_duration(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.iterations_per_second).unwrap_or(Duration::MAX)
    }

    /// Tempo meta value: microseconds per quarter note (24-bit).
    pub fn micros_per_beat(&self) -> u32 {
        ((60_000_000.0 / self.bpm).round() as u32).min(0xFF_FFFF)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(Error::invalid(format!("bpm must be positive, got {}", self.bpm)));
        }
        if self.ticks_per_beat == 0 || self.ticks_per_beat > 0x7FFF {
            return Err(Error::invalid(format!(
                "ticks per beat must be in 1..=32767, got {}",
                self.ticks_per_beat
            )));
        }
        if !(self.iterations_per_second.is_finite() && self.iterations_per_second > 0.0) {
            return Err(Error::invalid(format!(
                "iterations per second must be positive, got {}",
                self.iterations_per_second
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.iterations_per_second).is_err() {
            return Err(Error::invalid(format!(
                "iterations per second {} gives a note longer than any pause",
                self.iterations_per_second
            )));
        }
        Ok(())
    }
}

/// Logistic-map bifurcation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BifurcationConfig {
    pub r_start: f64,
    pub r_end: f64,
    pub r_step: f64,
    pub iterations: usize,
    pub burn_in: usize,
    pub velocity: u8,
    pub release_velocity: u8,
}

impl Default for BifurcationConfig {
    fn default() -> Self {
        Self {
            r_start: 2.9,
            r_end: 3.9999,
            r_step: 0.001,
            iterations: 1000,
            burn_in: 994,
            velocity: 64,
            release_velocity: 127,
        }
    }
}

impl BifurcationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.burn_in >= self.iterations {
            return Err(Error::invalid(format!(
                "burn-in ({}) must be less than the iteration count ({})",
                self.burn_in, self.iterations
            )));
        }
        if self.velocity > 127 || self.release_velocity > 127 {
            return Err(Error::invalid("velocities must be in 0..=127"));
        }
        // Sweep bounds and step are checked when the sweep is built
        crate::sweep::decimal_places(self.r_step)?;
        Ok(())
    }
}

/// What a diverging orbit does to the rest of a Hénon run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergencePolicy {
    /// Abandon the diverging orbit, continue with the next one
    #[default]
    SkipOrbit,
    /// Stop the whole run at the first divergence
    EndRun,
}

/// Radially expanding Hénon orbits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HenonConfig {
    pub a: f64,
    pub iterations_per_orbit: usize,
    pub number_of_orbits: usize,
    pub starting_radius: f64,
    pub on_divergence: DivergencePolicy,
}

impl Default for HenonConfig {
    fn default() -> Self {
        Self {
            a: 1.111,
            iterations_per_orbit: 32,
            number_of_orbits: 33,
            starting_radius: 0.1,
            on_divergence: DivergencePolicy::SkipOrbit,
        }
    }
}

impl HenonConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.a.is_finite() {
            return Err(Error::invalid(format!("angle a must be finite, got {}", self.a)));
        }
        if self.iterations_per_orbit == 0 {
            return Err(Error::invalid("iterations per orbit must be at least 1"));
        }
        if self.number_of_orbits == 0 {
            return Err(Error::invalid("number of orbits must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.starting_radius) {
            return Err(Error::invalid(format!(
                "starting radius must be in [0, 1), got {}",
                self.starting_radius
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub tempo: Tempo,
    pub bifurcation: BifurcationConfig,
    pub henon: HenonConfig,
    /// Fixed RNG seed; `None` means the binary picks a time-based one
    pub seed: Option<u64>,
}

impl RunConfig {
    /// Check every section; used at the program boundary before any sink
    /// or port is opened.
    pub fn validate(&self) -> Result<()> {
        self.tempo.validate()?;
        self.bifurcation.validate()?;
        self.henon.validate()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&data)?;
        info!("Loaded run configuration from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Run configuration saved to {:?}", path);
        Ok(())
    }
}
