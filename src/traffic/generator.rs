use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;

use super::region::Region;
use super::ship::{GroupId, Ship, ShipId, ShipKind, ShipStatus};

const SIZE_SPREAD: f64 = 0.3;
const DESIGNATED_CHANCE: f64 = 0.77;
const ACTIVE_CHANCE: f64 = 0.70;
const CONVOY_CHANCE: f64 = 0.30;
const JOIN_EXISTING_CONVOY_CHANCE: f64 = 0.70;
const STATUS_FLIP_CHANCE: f64 = 0.05;
const CONVOY_HAZARD_MULTIPLIER: f64 = 3.0;

const ORGANIZATIONS: &[&str] = &[
    "Merchant Guild Freighter",
    "Mining Consortium Hauler",
    "Navy Destroyer Group",
    "Heavy Cruiser Squadron",
    "Customs Frigate",
    "Patrol Corvette",
    "Raider Fighter Wing",
    "Security Interceptor Flight",
    "Colonial Transport Authority",
    "Medical Relief Corps",
    "Survey Institute",
    "Salvage Cooperative",
];

/// Outcome of one simulation step.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub region: Region,
    pub departed: Vec<ShipId>,
    pub arrived: Vec<ShipId>,
    pub survivors: usize,
    pub population: usize,
}

/// Owns the ship population of one room. Nothing else creates or removes
/// ships.
#[derive(Debug)]
pub struct TrafficGenerator {
    region: Region,
    ships: Vec<Ship>,
    next_ship: u64,
    next_group: u64,
    tick: u64,
}

impl TrafficGenerator {
    pub fn new<R: Rng + ?Sized>(region: Region, rng: &mut R) -> Self {
        let mut generator = Self {
            region,
            ships: Vec::new(),
            next_ship: 1,
            next_group: 1,
            tick: 0,
        };
        generator.initialize(region, rng);
        generator
    }

    /// Throws the current population away and generates a fresh one for
    /// `region`. Ids keep counting up, so no old id reappears.
    pub fn initialize<R: Rng + ?Sized>(&mut self, region: Region, rng: &mut R) -> usize {
        self.region = region;
        let size = initial_population_size(region, rng);
        let mut ships = Vec::with_capacity(size);
        for _ in 0..size {
            let ship = self.spawn(&ships, rng);
            ships.push(ship);
        }
        self.ships = ships;
        size
    }

    /// Runs one step: age, vote on convoy departures, filter, then arrivals.
    /// Ships for which `is_pinned` returns true always survive untouched
    /// apart from ageing.
    pub fn tick<R, F>(&mut self, is_pinned: F, rng: &mut R) -> TickReport
    where
        R: Rng + ?Sized,
        F: Fn(ShipId) -> bool,
    {
        self.tick += 1;

        for ship in &mut self.ships {
            ship.grow_older();
        }

        // Every convoy must finish voting before any survival roll reads it.
        let mut departing: HashSet<GroupId> = HashSet::new();
        for ship in &self.ships {
            let Some(group) = ship.group_id else {
                continue;
            };
            if departing.contains(&group) || is_pinned(ship.id) {
                continue;
            }
            if rng.gen::<f64>() < ship.kind().base_hazard() {
                departing.insert(group);
            }
        }

        let previous = std::mem::take(&mut self.ships);
        let mut next = Vec::with_capacity(previous.len());
        let mut departed = Vec::new();
        for mut ship in previous {
            if is_pinned(ship.id) {
                next.push(ship);
                continue;
            }
            let convoy_leaving = ship.group_id.is_some_and(|group| departing.contains(&group));
            let hazard = departure_hazard(ship.kind().base_hazard(), convoy_leaving);
            if rng.gen::<f64>() < hazard {
                departed.push(ship.id);
                continue;
            }
            if rng.gen_bool(STATUS_FLIP_CHANCE) {
                ship.status = ship.status.toggled();
            }
            next.push(ship);
        }
        let survivors = next.len();

        let arrivals = poisson(self.region.arrival_rate(), rng);
        let mut arrived = Vec::with_capacity(arrivals as usize);
        for _ in 0..arrivals {
            let ship = self.spawn(&next, rng);
            arrived.push(ship.id);
            next.push(ship);
        }

        self.ships = next;
        TickReport {
            tick: self.tick,
            region: self.region,
            departed,
            arrived,
            survivors,
            population: self.ships.len(),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn contains(&self, id: ShipId) -> bool {
        self.ships.iter().any(|ship| ship.id == id)
    }

    /// Rolls a new ship. `existing` is the population it will join, used to
    /// decide convoy membership.
    fn spawn<R: Rng + ?Sized>(&mut self, existing: &[Ship], rng: &mut R) -> Ship {
        let id = ShipId::new(self.next_ship);
        self.next_ship += 1;

        let kind = match rng.gen::<f64>() {
            roll if roll < 0.60 => ShipKind::Transient,
            roll if roll < 0.95 => ShipKind::Regular,
            _ => ShipKind::Persistent,
        };
        let designation = if rng.gen_bool(DESIGNATED_CHANCE) {
            Some(ORGANIZATIONS[rng.gen_range(0..ORGANIZATIONS.len())].to_string())
        } else {
            None
        };
        let status = if rng.gen_bool(ACTIVE_CHANCE) {
            ShipStatus::Active
        } else {
            ShipStatus::Inactive
        };
        let group_id = if rng.gen_bool(CONVOY_CHANCE) {
            Some(self.pick_convoy(existing, rng))
        } else {
            None
        };

        Ship::new(id, kind, designation, status, group_id)
    }

    fn pick_convoy<R: Rng + ?Sized>(&mut self, existing: &[Ship], rng: &mut R) -> GroupId {
        let mut groups: Vec<GroupId> = existing.iter().filter_map(|s| s.group_id).collect();
        groups.sort();
        groups.dedup();
        if !groups.is_empty() && rng.gen_bool(JOIN_EXISTING_CONVOY_CHANCE) {
            return groups[rng.gen_range(0..groups.len())];
        }
        let group = GroupId::new(self.next_group);
        self.next_group += 1;
        group
    }
}

/// Per-tick chance a ship leaves. Members of a departing convoy run at
/// triple their base hazard, capped at certainty.
pub fn departure_hazard(base: f64, convoy_departing: bool) -> f64 {
    if convoy_departing {
        (base * CONVOY_HAZARD_MULTIPLIER).min(1.0)
    } else {
        base
    }
}

/// `round(target + U(-0.5, 0.5) * target * 0.3)`, never negative.
pub fn initial_population_size<R: Rng + ?Sized>(region: Region, rng: &mut R) -> usize {
    let target = region.target_population() as f64;
    let jitter: f64 = rng.gen_range(-0.5..0.5);
    (target + jitter * target * SIZE_SPREAD).round().max(0.0) as usize
}

/// Poisson draw by inversion: multiply uniforms until the product drops
/// below `e^-lambda`; the number of draws minus one is the count.
pub fn poisson<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> u32 {
    if lambda <= 0.0 {
        return 0;
    }
    let limit = (-lambda).exp();
    let mut product = 1.0;
    let mut draws = 0u32;
    loop {
        draws += 1;
        product *= rng.gen::<f64>();
        if product < limit {
            return draws - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn ages_start_at_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let generator = TrafficGenerator::new(Region::CoreWorlds, &mut rng);
        assert!(generator.ships().iter().all(|ship| ship.age() == 0));
    }

    #[test]
    fn survivors_age_by_exactly_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut generator = TrafficGenerator::new(Region::DeepCore, &mut rng);
        for _ in 0..5 {
            let before: Vec<(ShipId, u64)> = generator
                .ships()
                .iter()
                .map(|ship| (ship.id, ship.age()))
                .collect();
            generator.tick(|_| false, &mut rng);
            for (id, age) in before {
                if let Some(ship) = generator.ships().iter().find(|s| s.id == id) {
                    assert_eq!(ship.age(), age + 1);
                }
            }
        }
    }

    #[test]
    fn ids_are_unique_across_regenerations() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut generator = TrafficGenerator::new(Region::DeepCore, &mut rng);
        let mut seen: HashSet<ShipId> = generator.ships().iter().map(|s| s.id).collect();
        generator.initialize(Region::DeepCore, &mut rng);
        for ship in generator.ships() {
            assert!(seen.insert(ship.id), "{} reused", ship.id);
        }
    }

    #[test]
    fn convoy_hazard_triples_and_caps() {
        assert_eq!(departure_hazard(0.10, false), 0.10);
        assert!((departure_hazard(0.10, true) - 0.30).abs() < 1e-12);
        let transient = departure_hazard(ShipKind::Transient.base_hazard(), true);
        assert!((transient - 0.90).abs() < 1e-12);
        assert_eq!(departure_hazard(0.5, true), 1.0);
        assert_eq!(departure_hazard(1.0, true), 1.0);
    }

    #[test]
    fn new_convoy_ships_mostly_join_existing_groups() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut generator = TrafficGenerator::new(Region::WildSpace, &mut rng);
        let existing: Vec<Ship> = [90, 91]
            .into_iter()
            .map(|group| {
                Ship::new(
                    ShipId::new(900 + group),
                    ShipKind::Regular,
                    None,
                    ShipStatus::Active,
                    Some(GroupId::new(group)),
                )
            })
            .collect();

        let trials = 10_000;
        let joined = (0..trials)
            .filter(|_| {
                let group = generator.pick_convoy(&existing, &mut rng);
                group == GroupId::new(90) || group == GroupId::new(91)
            })
            .count();

        let share = joined as f64 / trials as f64;
        assert!((share - 0.70).abs() < 0.02, "joined share {share}");
    }

    #[test]
    fn first_convoy_is_always_new() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut generator = TrafficGenerator::new(Region::WildSpace, &mut rng);
        let first = generator.pick_convoy(&[], &mut rng);
        let second = generator.pick_convoy(&[], &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn zero_rate_never_arrives() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!((0..100).all(|_| poisson(0.0, &mut rng) == 0));
    }

    #[test]
    fn convoys_form_in_dense_regions() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let generator = TrafficGenerator::new(Region::DeepCore, &mut rng);
        let grouped = generator
            .ships()
            .iter()
            .filter(|ship| ship.group_id.is_some())
            .count();
        assert!(grouped > 0);
    }
}
