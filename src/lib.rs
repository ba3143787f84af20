pub mod annotation;
pub mod config;
pub mod error;
pub mod rng;
pub mod room;
pub mod targeting;
pub mod traffic;
pub mod web;

pub use annotation::{PinColor, PinLevel, PinState};
pub use config::{ConfigLoader, ServerConfig};
pub use error::CommandError;
pub use room::{RoomRegistry, RoomSettings};
pub use targeting::TargetingRecord;
pub use traffic::{Region, Ship, ShipId, TrafficGenerator};
