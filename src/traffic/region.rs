use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CommandError;

/// Density tiers, ordered from the crowded core out to the frontier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    DeepCore,
    CoreWorlds,
    Colonies,
    InnerRim,
    #[default]
    MidRim,
    OuterRim,
    WildSpace,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::DeepCore,
        Region::CoreWorlds,
        Region::Colonies,
        Region::InnerRim,
        Region::MidRim,
        Region::OuterRim,
        Region::WildSpace,
    ];

    /// Mean arrivals per tick.
    pub fn arrival_rate(self) -> f64 {
        match self {
            Region::DeepCore => 4.0,
            Region::CoreWorlds => 3.0,
            Region::Colonies => 2.5,
            Region::InnerRim => 2.0,
            Region::MidRim => 1.5,
            Region::OuterRim => 1.0,
            Region::WildSpace => 0.5,
        }
    }

    pub fn target_population(self) -> u32 {
        match self {
            Region::DeepCore => 40,
            Region::CoreWorlds => 30,
            Region::Colonies => 25,
            Region::InnerRim => 20,
            Region::MidRim => 15,
            Region::OuterRim => 10,
            Region::WildSpace => 5,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::DeepCore => "Deep Core",
            Region::CoreWorlds => "Core Worlds",
            Region::Colonies => "Colonies",
            Region::InnerRim => "Inner Rim",
            Region::MidRim => "Mid Rim",
            Region::OuterRim => "Outer Rim",
            Region::WildSpace => "Wild Space",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Region::DeepCore => "deep_core",
            Region::CoreWorlds => "core_worlds",
            Region::Colonies => "colonies",
            Region::InnerRim => "inner_rim",
            Region::MidRim => "mid_rim",
            Region::OuterRim => "outer_rim",
            Region::WildSpace => "wild_space",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Region {
    type Err = CommandError;

    /// Accepts either the display name ("Mid Rim") or the key (`mid_rim`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Region::ALL
            .into_iter()
            .find(|region| {
                region.key() == trimmed || region.display_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| CommandError::UnknownRegion(trimmed.to_string()))
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Wire-facing summary used by `/api/regions`.
#[derive(Debug, Clone, Serialize)]
pub struct RegionInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub arrival_rate: f64,
    pub target_population: u32,
}

impl From<Region> for RegionInfo {
    fn from(region: Region) -> Self {
        Self {
            key: region.key(),
            name: region.display_name(),
            arrival_rate: region.arrival_rate(),
            target_population: region.target_population(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_falls_toward_the_frontier() {
        for pair in Region::ALL.windows(2) {
            assert!(pair[0].arrival_rate() > pair[1].arrival_rate());
            assert!(pair[0].target_population() > pair[1].target_population());
        }
    }

    #[test]
    fn parses_names_and_keys() {
        assert_eq!("Mid Rim".parse::<Region>().unwrap(), Region::MidRim);
        assert_eq!("mid_rim".parse::<Region>().unwrap(), Region::MidRim);
        assert_eq!(" wild space ".parse::<Region>().unwrap(), Region::WildSpace);
        assert!("Hyperspace".parse::<Region>().is_err());
    }

    #[test]
    fn deserializes_display_names() {
        let region: Region = serde_json::from_str("\"Outer Rim\"").unwrap();
        assert_eq!(region, Region::OuterRim);
        assert_eq!(serde_json::to_string(&region).unwrap(), "\"outer_rim\"");
    }

    #[test]
    fn mid_rim_parameters() {
        assert_eq!(Region::MidRim.arrival_rate(), 1.5);
        assert_eq!(Region::MidRim.target_population(), 15);
    }
}
