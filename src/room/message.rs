use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::annotation::{AnnotationEvent, PinLevel, PinState};
use crate::config::VesselProfile;
use crate::targeting::TargetingRecord;
use crate::traffic::{Region, Ship, ShipId, TickReport};

use super::command::{Command, StationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(u64);

impl ViewerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationRole {
    Command,
    Tactical,
    Communications,
    Engineering,
    Helm,
    Science,
    Facilitator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub viewer_id: ViewerId,
    pub role: StationRole,
    pub name: String,
}

/// Who caused a broadcast. Stations compare it against their own id to drop
/// echoes of their own commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Server,
    Generator,
    Viewer(ViewerId),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Server => f.write_str("server"),
            Source::Generator => f.write_str("generator"),
            Source::Viewer(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Room,
    /// Everyone except the viewer named in the source tag.
    Others,
}

/// The whole shared document of a room, as sent in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedState {
    pub region: Region,
    pub tick: u64,
    pub ships: Vec<Ship>,
    pub pins: PinState,
    pub targets: Vec<TargetingRecord>,
    #[serde(flatten)]
    pub station: StationState,
    pub vessel: VesselProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        viewer_id: ViewerId,
    },
    StateSnapshot {
        room: String,
        state: SharedState,
    },
    MembershipUpdate {
        room: String,
        members: Vec<MemberInfo>,
        owner: Option<ViewerId>,
    },
    PopulationUpdate {
        room: String,
        region: Region,
        tick: u64,
        report: Option<TickReport>,
        ships: Vec<Ship>,
        pins: PinState,
    },
    TargetingUpdate {
        room: String,
        targets: Vec<TargetingRecord>,
    },
    AnnotationEvent {
        room: String,
        ship_id: ShipId,
        new_state: PinLevel,
        singleton_id: Option<ShipId>,
    },
    SingletonChanged {
        room: String,
        previous: Option<ShipId>,
        current: Option<ShipId>,
    },
    CommandRelay {
        room: String,
        command: Command,
    },
}

impl ServerMessage {
    pub fn from_annotation(room: &str, event: AnnotationEvent) -> Self {
        match event {
            AnnotationEvent::PinChanged {
                ship_id,
                new_state,
                singleton_id,
            } => ServerMessage::AnnotationEvent {
                room: room.to_string(),
                ship_id,
                new_state,
                singleton_id,
            },
            AnnotationEvent::SingletonChanged { previous, current } => {
                ServerMessage::SingletonChanged {
                    room: room.to_string(),
                    previous,
                    current,
                }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::StateSnapshot { .. } => "state_snapshot",
            ServerMessage::MembershipUpdate { .. } => "membership_update",
            ServerMessage::PopulationUpdate { .. } => "population_update",
            ServerMessage::TargetingUpdate { .. } => "targeting_update",
            ServerMessage::AnnotationEvent { .. } => "annotation_event",
            ServerMessage::SingletonChanged { .. } => "singleton_changed",
            ServerMessage::CommandRelay { .. } => "command_relay",
        }
    }
}

/// One broadcast on a room topic.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub source: Source,
    #[serde(skip)]
    pub audience: Audience,
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl Envelope {
    pub fn to_room(source: Source, message: ServerMessage) -> Self {
        Self {
            source,
            audience: Audience::Room,
            message,
        }
    }

    pub fn to_others(source: Source, message: ServerMessage) -> Self {
        Self {
            source,
            audience: Audience::Others,
            message,
        }
    }

    /// `None` is an anonymous observer, which sees everything.
    pub fn visible_to(&self, viewer: Option<ViewerId>) -> bool {
        match (self.audience, self.source, viewer) {
            (Audience::Others, Source::Viewer(origin), Some(viewer)) => origin != viewer,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room: String,
        role: StationRole,
        name: String,
    },
    Leave {
        room: String,
    },
    Command {
        room: String,
        kind: String,
        #[serde(default)]
        value: Value,
    },
}
