use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipId(u64);

impl ShipId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ship-{}", self.0)
    }
}

/// Convoy correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipStatus {
    Active,
    Inactive,
}

impl ShipStatus {
    pub fn toggled(self) -> Self {
        match self {
            ShipStatus::Active => ShipStatus::Inactive,
            ShipStatus::Inactive => ShipStatus::Active,
        }
    }
}

/// How long a ship tends to linger; fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipKind {
    Transient,
    Regular,
    Persistent,
}

impl ShipKind {
    /// Per-tick probability of leaving when the ship's convoy is not departing.
    pub fn base_hazard(self) -> f64 {
        match self {
            ShipKind::Transient => 0.30,
            ShipKind::Regular => 0.10,
            ShipKind::Persistent => 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub designation: Option<String>,
    pub status: ShipStatus,
    pub entry_time: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: ShipKind,
    age: u64,
    pub group_id: Option<GroupId>,
}

impl Ship {
    pub fn new(
        id: ShipId,
        kind: ShipKind,
        designation: Option<String>,
        status: ShipStatus,
        group_id: Option<GroupId>,
    ) -> Self {
        Self {
            id,
            designation,
            status,
            entry_time: Utc::now(),
            kind,
            age: 0,
            group_id,
        }
    }

    pub fn kind(&self) -> ShipKind {
        self.kind
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn is_active(&self) -> bool {
        self.status == ShipStatus::Active
    }

    pub(crate) fn grow_older(&mut self) {
        self.age += 1;
    }
}
