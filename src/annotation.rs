//! Operator pins. A ship is unpinned, pinned white, or pinned red; at most
//! one ship is red at a time and that ship is the room's "double-pinned"
//! singleton.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::traffic::{Ship, ShipId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinColor {
    White,
    Red,
}

/// Pin state of a single ship, including the absent case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinLevel {
    None,
    White,
    Red,
}

impl From<Option<PinColor>> for PinLevel {
    fn from(value: Option<PinColor>) -> Self {
        match value {
            None => PinLevel::None,
            Some(PinColor::White) => PinLevel::White,
            Some(PinColor::Red) => PinLevel::Red,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnnotationEvent {
    PinChanged {
        ship_id: ShipId,
        new_state: PinLevel,
        singleton_id: Option<ShipId>,
    },
    SingletonChanged {
        previous: Option<ShipId>,
        current: Option<ShipId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinEntry {
    pub ship_id: ShipId,
    pub color: PinColor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinState {
    pins: Vec<PinEntry>,
    double_pinned: Option<ShipId>,
}

impl PinState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances `id` one step around `none -> white -> red -> none`.
    /// Ships outside `population` are refused.
    pub fn toggle(
        &mut self,
        id: ShipId,
        population: &[Ship],
    ) -> Result<Vec<AnnotationEvent>, CommandError> {
        if !population.iter().any(|ship| ship.id == id) {
            return Err(CommandError::UnknownShip(id));
        }

        let previous = self.double_pinned;
        let mut events = Vec::new();
        match self.color_of(id) {
            None => {
                if let Some(red) = self.double_pinned.take() {
                    self.remove(red);
                    events.push(AnnotationEvent::PinChanged {
                        ship_id: red,
                        new_state: PinLevel::None,
                        singleton_id: None,
                    });
                }
                self.pins.push(PinEntry {
                    ship_id: id,
                    color: PinColor::White,
                });
                events.push(AnnotationEvent::PinChanged {
                    ship_id: id,
                    new_state: PinLevel::White,
                    singleton_id: None,
                });
            }
            Some(PinColor::White) => {
                if let Some(red) = self.double_pinned.take() {
                    self.remove(red);
                    events.push(AnnotationEvent::PinChanged {
                        ship_id: red,
                        new_state: PinLevel::None,
                        singleton_id: None,
                    });
                }
                if let Some(entry) = self.pins.iter_mut().find(|entry| entry.ship_id == id) {
                    entry.color = PinColor::Red;
                }
                self.double_pinned = Some(id);
                events.push(AnnotationEvent::PinChanged {
                    ship_id: id,
                    new_state: PinLevel::Red,
                    singleton_id: Some(id),
                });
            }
            Some(PinColor::Red) => {
                self.remove(id);
                if self.double_pinned == Some(id) {
                    self.double_pinned = None;
                }
                events.push(AnnotationEvent::PinChanged {
                    ship_id: id,
                    new_state: PinLevel::None,
                    singleton_id: self.double_pinned,
                });
            }
        }

        if previous != self.double_pinned {
            events.push(AnnotationEvent::SingletonChanged {
                previous,
                current: self.double_pinned,
            });
        }
        Ok(events)
    }

    /// Unpins every ship.
    pub fn clear(&mut self) -> Vec<AnnotationEvent> {
        let previous = self.double_pinned.take();
        let mut events: Vec<AnnotationEvent> = self
            .pins
            .drain(..)
            .map(|entry| AnnotationEvent::PinChanged {
                ship_id: entry.ship_id,
                new_state: PinLevel::None,
                singleton_id: None,
            })
            .collect();
        if previous.is_some() {
            events.push(AnnotationEvent::SingletonChanged {
                previous,
                current: None,
            });
        }
        events
    }

    pub fn color_of(&self, id: ShipId) -> Option<PinColor> {
        self.pins
            .iter()
            .find(|entry| entry.ship_id == id)
            .map(|entry| entry.color)
    }

    pub fn level_of(&self, id: ShipId) -> PinLevel {
        self.color_of(id).into()
    }

    pub fn is_pinned(&self, id: ShipId) -> bool {
        self.color_of(id).is_some()
    }

    pub fn double_pinned(&self) -> Option<ShipId> {
        self.double_pinned
    }

    /// Pinned ships in the order they were first pinned.
    pub fn entries(&self) -> &[PinEntry] {
        &self.pins
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    fn remove(&mut self, id: ShipId) {
        self.pins.retain(|entry| entry.ship_id != id);
    }
}
