//! Background ship traffic: regions, ships and the birth-death generator.

mod generator;
mod region;
mod ship;

pub use generator::{
    departure_hazard, initial_population_size, poisson, TickReport, TrafficGenerator,
};
pub use region::{Region, RegionInfo};
pub use ship::{GroupId, Ship, ShipId, ShipKind, ShipStatus};
