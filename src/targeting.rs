//! Targeting view: up to five enriched records derived from the population
//! and pins. Classification is a pure function of the inputs; the spatial
//! and stat fields are random flavor and change on every projection.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::annotation::{PinColor, PinState};
use crate::traffic::{Ship, ShipId};

pub const MAX_TARGETS: usize = 5;

const BEARING_JITTER_DEG: f64 = 15.0;
const MIN_DISTANCE: f64 = 1000.0;
const MAX_DISTANCE: f64 = 8000.0;
const MAX_SPEED: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Hostile,
    Friendly,
    Neutral,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatTier {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Capital,
}

impl SizeClass {
    /// Buckets a designation by the hull words it mentions.
    pub fn from_designation(designation: Option<&str>) -> Self {
        let Some(designation) = designation else {
            return SizeClass::Medium;
        };
        let lower = designation.to_ascii_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| lower.contains(word));
        if mentions(&["destroyer", "cruiser"]) {
            SizeClass::Capital
        } else if mentions(&["frigate", "corvette"]) {
            SizeClass::Large
        } else if mentions(&["fighter", "interceptor"]) {
            SizeClass::Small
        } else {
            SizeClass::Medium
        }
    }

    fn weapon_range(self) -> (u32, u32) {
        match self {
            SizeClass::Small => (1, 2),
            SizeClass::Medium => (2, 4),
            SizeClass::Large => (4, 7),
            SizeClass::Capital => (8, 12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub heading_deg: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRecord {
    pub ship_id: ShipId,
    pub designation: Option<String>,
    pub bearing_deg: f64,
    pub distance: f64,
    pub velocity: Velocity,
    pub faction: Faction,
    pub threat: ThreatTier,
    pub size: SizeClass,
    pub shields_pct: u32,
    pub hull_pct: u32,
    pub weapon_count: u32,
}

pub fn faction_for(ship: &Ship, pin: Option<PinColor>) -> Faction {
    match pin {
        Some(PinColor::Red) => Faction::Hostile,
        Some(PinColor::White) => Faction::Friendly,
        None if ship.designation.is_some() => Faction::Neutral,
        None => Faction::Unknown,
    }
}

/// Red pins are critical. Active unidentified contacts rate higher than
/// active identified ones; anything inactive is low.
pub fn threat_for(ship: &Ship, pin: Option<PinColor>) -> ThreatTier {
    if pin == Some(PinColor::Red) {
        return ThreatTier::Critical;
    }
    match (ship.is_active(), ship.designation.is_some()) {
        (true, false) => ThreatTier::High,
        (true, true) => ThreatTier::Medium,
        (false, _) => ThreatTier::Low,
    }
}

/// Pinned ships first, in pin order, then the rest in population order.
pub fn select<'a>(population: &'a [Ship], pins: &PinState) -> Vec<&'a Ship> {
    let mut selected: Vec<&Ship> = pins
        .entries()
        .iter()
        .filter_map(|entry| population.iter().find(|ship| ship.id == entry.ship_id))
        .take(MAX_TARGETS)
        .collect();
    let remaining = MAX_TARGETS.saturating_sub(selected.len());
    selected.extend(
        population
            .iter()
            .filter(|ship| !pins.is_pinned(ship.id))
            .take(remaining),
    );
    selected
}

pub fn project<R: Rng + ?Sized>(
    population: &[Ship],
    pins: &PinState,
    rng: &mut R,
) -> Vec<TargetingRecord> {
    let selected = select(population, pins);
    let spacing = 360.0 / selected.len().max(1) as f64;
    selected
        .into_iter()
        .enumerate()
        .map(|(index, ship)| {
            let pin = pins.color_of(ship.id);
            let size = SizeClass::from_designation(ship.designation.as_deref());
            let (min_weapons, max_weapons) = size.weapon_range();
            let jitter = rng.gen_range(-BEARING_JITTER_DEG..BEARING_JITTER_DEG);
            TargetingRecord {
                ship_id: ship.id,
                designation: ship.designation.clone(),
                bearing_deg: (index as f64 * spacing + jitter).rem_euclid(360.0),
                distance: rng.gen_range(MIN_DISTANCE..MAX_DISTANCE),
                velocity: Velocity {
                    heading_deg: rng.gen_range(0.0..360.0),
                    speed: rng.gen_range(0.0..MAX_SPEED),
                },
                faction: faction_for(ship, pin),
                threat: threat_for(ship, pin),
                size,
                shields_pct: rng.gen_range(50..=100),
                hull_pct: rng.gen_range(60..=100),
                weapon_count: rng.gen_range(min_weapons..=max_weapons),
            }
        })
        .collect()
}
