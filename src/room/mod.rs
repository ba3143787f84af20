//! Room-scoped replication: one authoritative session per room, fanned out
//! to every attached viewer over a broadcast topic.

mod channel;
mod command;
mod message;
mod registry;
mod session;

pub use channel::{EnvelopeStream, Room, RoomHandle, Subscription};
pub use command::{
    AlertLevel, Command, CommsState, LogEntry, PowerDistribution, PowerSetting, PowerSystem,
    StationState,
};
pub use message::{
    Audience, ClientMessage, Envelope, MemberInfo, ServerMessage, SharedState, Source,
    StationRole, ViewerId,
};
pub use registry::{RoomRegistry, RoomSettings, RoomSummary};
pub use session::RoomSession;
