use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, VesselProfile};
use crate::error::CommandError;
use crate::rng::RngManager;
use crate::traffic::Region;

use super::channel::{Room, RoomHandle, Subscription};
use super::command::Command;
use super::message::{ServerMessage, StationRole, ViewerId};
use super::session::RoomSession;

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub default_room: String,
    pub initial_region: Region,
    pub channel_capacity: usize,
    /// `None` disables the background ticker; rooms then only advance
    /// through [`Room::tick`].
    pub tick_interval: Option<Duration>,
    pub seed: Option<u64>,
    pub vessel: VesselProfile,
}

impl RoomSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            default_room: config.default_room.clone(),
            initial_region: config.initial_region,
            channel_capacity: config.channel_capacity,
            tick_interval: Some(config.tick_interval()),
            seed: config.seed,
            vessel: config.vessel.clone(),
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room: String,
    pub members: usize,
    pub region: Region,
    pub population: usize,
}

/// Every room the server knows about. Rooms are independent: the registry
/// lock only guards the map, never a session.
pub struct RoomRegistry {
    settings: RoomSettings,
    rooms: Mutex<HashMap<String, RoomHandle>>,
    seeds: Mutex<RngManager>,
    next_viewer: AtomicU64,
}

impl RoomRegistry {
    /// Creates the registry and its default room. With a tick interval set
    /// this must run inside a tokio runtime.
    pub fn new(settings: RoomSettings) -> Self {
        let registry = Self {
            seeds: Mutex::new(RngManager::new(settings.seed)),
            settings,
            rooms: Mutex::new(HashMap::new()),
            next_viewer: AtomicU64::new(1),
        };
        let default_room = registry.settings.default_room.clone();
        registry.get_or_create(&default_room);
        registry
    }

    pub fn default_room(&self) -> &str {
        &self.settings.default_room
    }

    pub fn next_viewer_id(&self) -> ViewerId {
        ViewerId::new(self.next_viewer.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self, key: &str) -> Option<RoomHandle> {
        self.rooms().get(key).cloned()
    }

    pub fn get_or_create(&self, key: &str) -> RoomHandle {
        self.room_in(&mut self.rooms(), key)
    }

    /// Joins `viewer` to `room`, creating the room on first use.
    pub fn join(
        &self,
        room: &str,
        viewer: ViewerId,
        role: StationRole,
        name: &str,
    ) -> Result<(Subscription, ServerMessage), CommandError> {
        let key = room.trim();
        if key.is_empty() {
            return Err(CommandError::OutOfRange {
                field: "room",
                value: room.to_string(),
            });
        }
        let name = match name.trim() {
            "" => viewer.to_string(),
            trimmed => trimmed.to_string(),
        };
        // Prune takes the same lock, so the room cannot vanish mid-join.
        let mut rooms = self.rooms();
        Ok(self.room_in(&mut rooms, key).join(viewer, role, name))
    }

    pub fn leave(&self, room: &str, viewer: ViewerId) -> bool {
        let key = room.trim();
        let left = self
            .get(key)
            .map(|handle| handle.leave(viewer))
            .unwrap_or(false);
        if left {
            self.prune(key);
        }
        left
    }

    pub fn apply(&self, room: &str, viewer: ViewerId, command: Command) -> Result<(), CommandError> {
        let handle = self
            .get(room.trim())
            .ok_or_else(|| CommandError::UnknownRoom(room.to_string()))?;
        handle.apply(viewer, command)
    }

    /// Parses and applies a raw wire command. Failures are logged and
    /// otherwise dropped; the sender hears nothing back.
    pub fn submit(&self, room: &str, viewer: ViewerId, kind: &str, value: serde_json::Value) -> bool {
        let outcome = Command::parse(kind, value).and_then(|command| self.apply(room, viewer, command));
        match outcome {
            Ok(()) => true,
            Err(err) => {
                warn!(%room, %viewer, %kind, error = %err, "command dropped");
                false
            }
        }
    }

    /// Removes `viewer` from every room it was in. Returns those rooms.
    pub fn disconnect(&self, viewer: ViewerId) -> Vec<String> {
        let handles: Vec<RoomHandle> = self.rooms().values().cloned().collect();
        let mut left: Vec<String> = handles
            .into_iter()
            .filter(|room| room.leave(viewer))
            .map(|room| room.key().to_string())
            .collect();
        left.sort();
        for key in &left {
            self.prune(key);
        }
        debug!(%viewer, rooms = left.len(), "viewer disconnected");
        left
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.rooms().values().cloned().collect();
        let mut summaries: Vec<RoomSummary> = handles
            .iter()
            .map(|room| {
                room.with_session(|session| RoomSummary {
                    room: room.key().to_string(),
                    members: session.members().len(),
                    region: session.traffic().region(),
                    population: session.traffic().ships().len(),
                })
            })
            .collect();
        summaries.sort_by(|a, b| a.room.cmp(&b.room));
        summaries
    }

    fn room_in(&self, rooms: &mut HashMap<String, RoomHandle>, key: &str) -> RoomHandle {
        if let Some(room) = rooms.get(key) {
            return room.clone();
        }
        let seed = self.settings.seed.map(|_| {
            self.seeds
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .fork_seed()
        });
        let session = RoomSession::new(
            key,
            self.settings.initial_region,
            seed,
            self.settings.vessel.clone(),
        );
        let room: RoomHandle = Arc::new(Room::new(session, self.settings.channel_capacity));
        if let Some(period) = self.settings.tick_interval {
            spawn_ticker(&room, period);
        }
        info!(room = %key, region = %self.settings.initial_region, "room created");
        rooms.insert(key.to_string(), room.clone());
        room
    }

    /// Drops `key` once nobody is in it. The default room always stays.
    fn prune(&self, key: &str) {
        if key == self.settings.default_room {
            return;
        }
        let mut rooms = self.rooms();
        if rooms.get(key).is_some_and(|room| room.member_count() == 0) {
            rooms.remove(key);
            info!(room = %key, "room closed");
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, RoomHandle>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Advances `room` every `period` until the registry drops it.
fn spawn_ticker(room: &RoomHandle, period: Duration) {
    if tokio::runtime::Handle::try_current().is_err() {
        warn!(room = %room.key(), "no runtime available; traffic ticker not started");
        return;
    }
    let weak = Arc::downgrade(room);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(room) = weak.upgrade() else {
                break;
            };
            room.tick();
        }
    });
}
