use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::traffic::Region;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_tick_interval_secs() -> f64 {
    5.0
}

fn default_room() -> String {
    "default".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: f64,
    #[serde(default = "default_room")]
    pub default_room: String,
    #[serde(default)]
    pub initial_region: Region,
    /// Master seed for every room's random streams. Entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub vessel: VesselProfile,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tick_interval_secs: default_tick_interval_secs(),
            default_room: default_room(),
            initial_region: Region::default(),
            seed: None,
            channel_capacity: default_channel_capacity(),
            log_level: default_log_level(),
            vessel: VesselProfile::default(),
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        match Duration::try_from_secs_f64(self.tick_interval_secs) {
            Ok(period) if !period.is_zero() => {}
            _ => bail!(
                "tick_interval_secs must be a positive duration, got {}",
                self.tick_interval_secs
            ),
        }
        if self.default_room.trim().is_empty() {
            bail!("default_room must not be empty");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        Ok(())
    }
}

/// The bridge crew's own ship, shown read-only to every station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselProfile {
    pub name: String,
    pub class: String,
    pub shields: u32,
    pub weapons: Vec<String>,
}

impl Default for VesselProfile {
    fn default() -> Self {
        Self {
            name: "Wayfarer".to_string(),
            class: "Freighter".to_string(),
            shields: 100,
            weapons: vec![
                "Quad Laser Cannons".to_string(),
                "Concussion Missiles".to_string(),
            ],
        }
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<ServerConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_takes_every_default() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.default_room, "default");
        assert_eq!(config.initial_region, Region::MidRim);
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
        assert!(config.seed.is_none());
    }

    #[test]
    fn rejects_non_positive_interval() {
        let config = ServerConfig {
            tick_interval_secs: 0.0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_intervals_that_round_to_zero() {
        let config = ServerConfig {
            tick_interval_secs: 1e-12,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_intervals_too_long_for_a_duration() {
        for secs in [1e30, f64::INFINITY, f64::NAN, -1.0] {
            let config = ServerConfig {
                tick_interval_secs: secs,
                ..ServerConfig::default()
            };
            assert!(config.validate().is_err(), "{secs} accepted");
        }
    }

    #[test]
    fn accepts_sub_second_intervals() {
        let config = ServerConfig {
            tick_interval_secs: 0.25,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn loads_region_by_display_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bridge.yaml"),
            "port: 6100\ninitial_region: Outer Rim\nseed: 9\nvessel:\n  name: Lantern\n  class: Corvette\n  shields: 80\n  weapons: [Railgun]\n",
        )
        .unwrap();

        let config = ConfigLoader::new(dir.path()).load("bridge.yaml").unwrap();

        assert_eq!(config.port, 6100);
        assert_eq!(config.initial_region, Region::OuterRim);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.vessel.name, "Lantern");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new(dir.path())
            .load("absent.yaml")
            .unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }
}
