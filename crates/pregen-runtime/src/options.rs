use std::str::FromStr;

use pregen_backend::RelightIntensity;
use serde::{Deserialize, Serialize};

/// Named throttle configuration: tile size, tick cadence and per-tick relight budgets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedProfile {
    /// Ticks every couple of host ticks and drains whole tiles per step. Unplayable lag.
    AllAtOnce,
    VeryFast,
    Fast,
    #[default]
    Normal,
    Slow,
    /// Tiny tiles, barely noticeable, takes forever.
    VerySlow,
}

impl SpeedProfile {
    pub const ALL: [SpeedProfile; 6] = [
        SpeedProfile::AllAtOnce,
        SpeedProfile::VeryFast,
        SpeedProfile::Fast,
        SpeedProfile::Normal,
        SpeedProfile::Slow,
        SpeedProfile::VerySlow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpeedProfile::AllAtOnce => "all_at_once",
            SpeedProfile::VeryFast => "very_fast",
            SpeedProfile::Fast => "fast",
            SpeedProfile::Normal => "normal",
            SpeedProfile::Slow => "slow",
            SpeedProfile::VerySlow => "very_slow",
        }
    }

    #[inline]
    pub fn runs_all_at_once(self) -> bool {
        self == SpeedProfile::AllAtOnce
    }

    pub fn default_tuning(self) -> ProfileTuning {
        let (region_size, tick_period, relight_normal, relight_extreme) = match self {
            SpeedProfile::AllAtOnce => (20, 2, usize::MAX, usize::MAX),
            SpeedProfile::VeryFast => (32, 60, 512, 160),
            SpeedProfile::Fast => (24, 60, 256, 80),
            SpeedProfile::Normal => (12, 60, 96, 32),
            SpeedProfile::Slow => (8, 60, 32, 8),
            SpeedProfile::VerySlow => (6, 60, 8, 1),
        };
        ProfileTuning {
            region_size,
            tick_period,
            relight_normal,
            relight_extreme,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseSpeedError(pub String);

impl FromStr for SpeedProfile {
    type Err = ParseSpeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "allatonce" => Ok(SpeedProfile::AllAtOnce),
            "veryfast" => Ok(SpeedProfile::VeryFast),
            "fast" => Ok(SpeedProfile::Fast),
            "normal" => Ok(SpeedProfile::Normal),
            "slow" => Ok(SpeedProfile::Slow),
            "veryslow" => Ok(SpeedProfile::VerySlow),
            _ => Err(ParseSpeedError(s.to_string())),
        }
    }
}

/// Concrete numbers behind a [`SpeedProfile`]. `usize::MAX` budgets drain the queue in one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileTuning {
    pub region_size: i32,
    pub tick_period: u32,
    pub relight_normal: usize,
    pub relight_extreme: usize,
}

impl ProfileTuning {
    /// Cells relit per step. The extreme pass costs roughly three times the normal one and
    /// gets a proportionally smaller budget.
    #[inline]
    pub fn chunks_per_tick(&self, intensity: RelightIntensity) -> usize {
        match intensity {
            RelightIntensity::Normal => self.relight_normal,
            RelightIntensity::Extreme => self.relight_extreme,
        }
    }

    pub(crate) fn sanitized(self, min_region: i32) -> Self {
        Self {
            region_size: self.region_size.max(min_region),
            tick_period: self.tick_period.max(1),
            relight_normal: self.relight_normal.max(1),
            relight_extreme: self.relight_extreme.max(1),
        }
    }
}

/// Whether and how hard newly materialized cells get a forced lighting pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingPolicy {
    /// Lighting stays stale until the host touches the area naturally.
    None,
    #[default]
    Normal,
    NormalExisting,
    Extreme,
    ExtremeExisting,
}

impl LightingPolicy {
    pub fn intensity(self) -> Option<RelightIntensity> {
        match self {
            LightingPolicy::None => None,
            LightingPolicy::Normal | LightingPolicy::NormalExisting => Some(RelightIntensity::Normal),
            LightingPolicy::Extreme | LightingPolicy::ExtremeExisting => {
                Some(RelightIntensity::Extreme)
            }
        }
    }

    /// Also relight cells that existed before the job touched them.
    pub fn relights_existing(self) -> bool {
        matches!(
            self,
            LightingPolicy::NormalExisting | LightingPolicy::ExtremeExisting
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            LightingPolicy::None => "none",
            LightingPolicy::Normal => "normal",
            LightingPolicy::NormalExisting => "normal+existing",
            LightingPolicy::Extreme => "extreme",
            LightingPolicy::ExtremeExisting => "extreme+existing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseLightingError(pub String);

impl FromStr for LightingPolicy {
    type Err = ParseLightingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(LightingPolicy::None),
            "normal" | "true" => Ok(LightingPolicy::Normal),
            "normal+existing" | "true+existing" => Ok(LightingPolicy::NormalExisting),
            "extreme" | "force" => Ok(LightingPolicy::Extreme),
            "extreme+existing" | "force+existing" => Ok(LightingPolicy::ExtremeExisting),
            _ => Err(ParseLightingError(s.to_string())),
        }
    }
}

/// Job-scoped switches chosen at submission time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub speed: SpeedProfile,
    #[serde(default)]
    pub lighting: LightingPolicy,
    /// Evacuate, force-evict and regenerate every existing cell in the region.
    #[serde(default)]
    pub force_regenerate: bool,
    /// Do no work while any occupant is online.
    #[serde(default)]
    pub pause_when_occupied: bool,
    #[serde(default)]
    pub debug: bool,
}

impl std::fmt::Display for ParseSpeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown speed \"{}\"", self.0)
    }
}

impl std::error::Error for ParseSpeedError {}

impl std::fmt::Display for ParseLightingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid lighting mode \"{}\"", self.0)
    }
}

impl std::error::Error for ParseLightingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_names_parse_with_any_separator() {
        assert_eq!("allatonce".parse(), Ok(SpeedProfile::AllAtOnce));
        assert_eq!("all-at-once".parse(), Ok(SpeedProfile::AllAtOnce));
        assert_eq!("Very_Slow".parse(), Ok(SpeedProfile::VerySlow));
        assert!("ludicrous".parse::<SpeedProfile>().is_err());
        for speed in SpeedProfile::ALL {
            assert_eq!(speed.name().parse(), Ok(speed));
        }
    }

    #[test]
    fn lighting_aliases() {
        assert_eq!("true".parse(), Ok(LightingPolicy::Normal));
        assert_eq!("FORCE".parse(), Ok(LightingPolicy::Extreme));
        assert_eq!("extreme+existing".parse(), Ok(LightingPolicy::ExtremeExisting));
        assert!("bright".parse::<LightingPolicy>().is_err());
        assert_eq!(LightingPolicy::None.intensity(), None);
        assert!(!LightingPolicy::Extreme.relights_existing());
    }

    #[test]
    fn slower_profiles_throttle_harder() {
        let budgets: Vec<(usize, usize)> = SpeedProfile::ALL
            .iter()
            .map(|s| {
                let t = s.default_tuning();
                (
                    t.chunks_per_tick(RelightIntensity::Normal),
                    t.chunks_per_tick(RelightIntensity::Extreme),
                )
            })
            .collect();
        for pair in budgets.windows(2) {
            assert!(pair[0].0 >= pair[1].0);
            assert!(pair[0].1 >= pair[1].1);
        }
        for (normal, extreme) in budgets {
            assert!(extreme <= normal);
        }
        assert_eq!(SpeedProfile::VerySlow.default_tuning().relight_extreme, 1);
    }
}
