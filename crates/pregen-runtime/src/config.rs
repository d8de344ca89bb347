use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use pregen_grid::TILE_OVERLAP;
use serde::Deserialize;

use crate::options::{ProfileTuning, SpeedProfile};

/// Engine tunables. Every field has a default so a partial TOML table is enough.
#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Memory fraction above which productive work pauses.
    #[serde(default = "default_high_water")]
    pub high_water: f32,
    /// Once paused, memory must fall to this fraction before work resumes.
    #[serde(default = "default_low_water")]
    pub low_water: f32,
    #[serde(default = "default_nag_cooldown_secs")]
    pub nag_cooldown_secs: u64,
    #[serde(default = "default_evict_retry_ceiling")]
    pub evict_retry_ceiling: u32,
    #[serde(default = "default_backlog_drain_threshold")]
    pub backlog_drain_threshold: usize,
    /// Share of a tile's cost attributed to relighting in progress reports.
    #[serde(default = "default_relight_weight")]
    pub relight_weight: f32,
    #[serde(default)]
    pub profiles: HashMap<SpeedProfile, ProfileOverride>,
}

fn default_high_water() -> f32 {
    0.85
}
fn default_low_water() -> f32 {
    0.75
}
fn default_nag_cooldown_secs() -> u64 {
    300
}
fn default_evict_retry_ceiling() -> u32 {
    20
}
fn default_backlog_drain_threshold() -> usize {
    500_000
}
fn default_relight_weight() -> f32 {
    0.7
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            high_water: default_high_water(),
            low_water: default_low_water(),
            nag_cooldown_secs: default_nag_cooldown_secs(),
            evict_retry_ceiling: default_evict_retry_ceiling(),
            backlog_drain_threshold: default_backlog_drain_threshold(),
            relight_weight: default_relight_weight(),
            profiles: HashMap::new(),
        }
    }
}

/// Per-profile overrides; unset fields keep the profile default. A relight budget of 0
/// means unbounded.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ProfileOverride {
    #[serde(default)]
    pub region_size: Option<i32>,
    #[serde(default)]
    pub tick_period: Option<u32>,
    #[serde(default)]
    pub relight_normal: Option<usize>,
    #[serde(default)]
    pub relight_extreme: Option<usize>,
}

/// Scalar limits copied into each job at creation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobLimits {
    pub high_water: f32,
    pub low_water: f32,
    pub nag_cooldown: Duration,
    pub evict_retry_ceiling: u32,
    pub backlog_drain_threshold: usize,
    pub relight_weight: f32,
}

impl RuntimeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: RuntimeConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn tuning(&self, speed: SpeedProfile) -> ProfileTuning {
        let mut t = speed.default_tuning();
        if let Some(o) = self.profiles.get(&speed) {
            let unbounded = |v: usize| if v == 0 { usize::MAX } else { v };
            if let Some(v) = o.region_size {
                t.region_size = v;
            }
            if let Some(v) = o.tick_period {
                t.tick_period = v;
            }
            if let Some(v) = o.relight_normal {
                t.relight_normal = unbounded(v);
            }
            if let Some(v) = o.relight_extreme {
                t.relight_extreme = unbounded(v);
            }
        }
        t.sanitized(TILE_OVERLAP + 1)
    }

    pub fn limits(&self) -> JobLimits {
        let high_water = finite_or(self.high_water, default_high_water()).clamp(0.0, 1.0);
        JobLimits {
            high_water,
            low_water: finite_or(self.low_water, default_low_water()).clamp(0.0, high_water),
            nag_cooldown: Duration::from_secs(self.nag_cooldown_secs),
            evict_retry_ceiling: self.evict_retry_ceiling.max(1),
            backlog_drain_threshold: self.backlog_drain_threshold,
            relight_weight: finite_or(self.relight_weight, default_relight_weight()).clamp(0.0, 1.0),
        }
    }
}

// TOML accepts nan and inf for floats.
fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let cfg = RuntimeConfig::from_toml_str("").unwrap();
        let limits = cfg.limits();
        assert_eq!(limits.high_water, 0.85);
        assert_eq!(limits.low_water, 0.75);
        assert_eq!(limits.nag_cooldown, Duration::from_secs(300));
        assert_eq!(limits.evict_retry_ceiling, 20);
        assert_eq!(cfg.tuning(SpeedProfile::Normal).region_size, 12);
        assert_eq!(cfg.tuning(SpeedProfile::AllAtOnce).tick_period, 2);
    }

    #[test]
    fn profile_overrides_merge_and_clamp() {
        let cfg = RuntimeConfig::from_toml_str(
            r#"
            high_water = 0.5
            low_water = 0.9
            evict_retry_ceiling = 0

            [profiles.normal]
            region_size = 1
            relight_extreme = 0

            [profiles.very_slow]
            tick_period = 120
            "#,
        )
        .unwrap();
        let normal = cfg.tuning(SpeedProfile::Normal);
        assert_eq!(normal.region_size, TILE_OVERLAP + 1);
        assert_eq!(normal.relight_normal, 96);
        assert_eq!(normal.relight_extreme, usize::MAX);
        assert_eq!(cfg.tuning(SpeedProfile::VerySlow).tick_period, 120);
        let limits = cfg.limits();
        assert_eq!(limits.low_water, 0.5);
        assert_eq!(limits.evict_retry_ceiling, 1);
    }

    #[test]
    fn non_finite_limits_fall_back_to_defaults() {
        let cfg = RuntimeConfig::from_toml_str(
            r#"
            high_water = nan
            low_water = -inf
            relight_weight = inf
            "#,
        )
        .unwrap();
        let limits = cfg.limits();
        assert_eq!(limits.high_water, 0.85);
        assert_eq!(limits.low_water, 0.75);
        assert_eq!(limits.relight_weight, 0.7);

        let cfg = RuntimeConfig::from_toml_str("high_water = 0.5\nlow_water = nan").unwrap();
        assert_eq!(cfg.limits().low_water, 0.5);
    }
}
