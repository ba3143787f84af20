use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CommandError;
use crate::traffic::{Region, ShipId};

use super::message::StationRole;

pub const MIN_FREQUENCY_MHZ: f64 = 100.0;
pub const MAX_FREQUENCY_MHZ: f64 = 999.9;
pub const MAX_POWER_LEVEL: i64 = 100;
pub const MAX_MESSAGE_LEN: usize = 280;
pub const MESSAGE_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSystem {
    Shields,
    Weapons,
    Engines,
    Sensors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSetting {
    pub system: PowerSystem,
    pub level: i64,
}

/// A room mutation. Each variant writes exactly one field path of the
/// shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Command {
    SetRegion(Region),
    TogglePin(ShipId),
    ClearPins,
    SetAlert(AlertLevel),
    SetPower(PowerSetting),
    SetFrequency(f64),
    SendMessage(String),
}

impl Command {
    /// Builds a command from its wire `kind` and `value` and range-checks it.
    pub fn parse(kind: &str, value: Value) -> Result<Self, CommandError> {
        let raw = if value.is_null() {
            json!({ "kind": kind })
        } else {
            json!({ "kind": kind, "value": value })
        };
        let command: Command = serde_json::from_value(raw)?;
        command.validate()?;
        Ok(command)
    }

    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Command::SetPower(setting) if !(0..=MAX_POWER_LEVEL).contains(&setting.level) => {
                Err(CommandError::OutOfRange {
                    field: "power",
                    value: setting.level.to_string(),
                })
            }
            Command::SetFrequency(mhz)
                if !mhz.is_finite() || !(MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(mhz) =>
            {
                Err(CommandError::OutOfRange {
                    field: "comms.frequency",
                    value: mhz.to_string(),
                })
            }
            Command::SendMessage(text)
                if text.trim().is_empty() || text.chars().count() > MAX_MESSAGE_LEN =>
            {
                Err(CommandError::OutOfRange {
                    field: "comms.log",
                    value: format!("{} chars", text.chars().count()),
                })
            }
            _ => Ok(()),
        }
    }

    /// Field path the command writes.
    pub fn field_path(&self) -> &'static str {
        match self {
            Command::SetRegion(_) => "region",
            Command::TogglePin(_) | Command::ClearPins => "pins",
            Command::SetAlert(_) => "alert",
            Command::SetPower(_) => "power",
            Command::SetFrequency(_) => "comms.frequency",
            Command::SendMessage(_) => "comms.log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerDistribution {
    pub shields: i64,
    pub weapons: i64,
    pub engines: i64,
    pub sensors: i64,
}

impl Default for PowerDistribution {
    fn default() -> Self {
        Self {
            shields: 50,
            weapons: 50,
            engines: 50,
            sensors: 50,
        }
    }
}

impl PowerDistribution {
    pub fn set(&mut self, system: PowerSystem, level: i64) {
        let slot = match system {
            PowerSystem::Shields => &mut self.shields,
            PowerSystem::Weapons => &mut self.weapons,
            PowerSystem::Engines => &mut self.engines,
            PowerSystem::Sensors => &mut self.sensors,
        };
        *slot = level;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub from: String,
    pub station: Option<StationRole>,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommsState {
    pub frequency: f64,
    pub log: Vec<LogEntry>,
}

impl Default for CommsState {
    fn default() -> Self {
        Self {
            frequency: 121.5,
            log: Vec::new(),
        }
    }
}

impl CommsState {
    pub fn push(&mut self, entry: LogEntry) {
        self.log.push(entry);
        if self.log.len() > MESSAGE_LOG_CAPACITY {
            let overflow = self.log.len() - MESSAGE_LOG_CAPACITY;
            self.log.drain(..overflow);
        }
    }
}

/// Station-owned fields of the shared document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationState {
    pub alert: AlertLevel,
    pub power: PowerDistribution,
    pub comms: CommsState,
}
