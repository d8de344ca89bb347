use std::error::Error;
use std::fs;
use std::path::Path;

use pregen_runtime::RuntimeConfig;
use serde::Deserialize;

/// Whole-file configuration: engine tunables plus the reference host.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Parameters of the in-memory host the binary drives.
#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    /// Resident cells that count as 100% memory in use.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_existing_frequency")]
    pub existing_frequency: f32,
    /// Noise value above which a cell already exists in storage.
    #[serde(default = "default_existing_threshold")]
    pub existing_threshold: f32,
    #[serde(default = "default_true")]
    pub lighting_supported: bool,
    #[serde(default = "default_host_ticks_per_second")]
    pub host_ticks_per_second: u32,
    /// Sleep between host ticks instead of running on a simulated clock.
    #[serde(default)]
    pub realtime: bool,
}

fn default_seed() -> i32 {
    1337
}
fn default_capacity() -> usize {
    4096
}
fn default_existing_frequency() -> f32 {
    0.02
}
fn default_existing_threshold() -> f32 {
    0.2
}
fn default_true() -> bool {
    true
}
fn default_host_ticks_per_second() -> u32 {
    20
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            capacity: default_capacity(),
            existing_frequency: default_existing_frequency(),
            existing_threshold: default_existing_threshold(),
            lighting_supported: true,
            host_ticks_per_second: default_host_ticks_per_second(),
            realtime: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregen_runtime::SpeedProfile;

    #[test]
    fn sample_file_parses() {
        let cfg = AppConfig::from_toml_str(include_str!("../pregen.toml")).unwrap();
        assert_eq!(cfg.sim.seed, 1337);
        assert_eq!(cfg.runtime.limits().evict_retry_ceiling, 20);
        assert_eq!(cfg.runtime.tuning(SpeedProfile::Normal).region_size, 12);
    }

    #[test]
    fn partial_tables_keep_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [sim]
            capacity = 100
            lighting_supported = false

            [runtime.profiles.fast]
            tick_period = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sim.capacity, 100);
        assert!(!cfg.sim.lighting_supported);
        assert_eq!(cfg.sim.host_ticks_per_second, 20);
        assert_eq!(cfg.runtime.tuning(SpeedProfile::Fast).tick_period, 30);
        assert_eq!(cfg.runtime.tuning(SpeedProfile::Fast).region_size, 24);
        assert_eq!(cfg.runtime.high_water, 0.85);
    }
}
