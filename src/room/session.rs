use chrono::Utc;
use tracing::{debug, info};

use crate::annotation::PinState;
use crate::config::VesselProfile;
use crate::error::CommandError;
use crate::rng::RngManager;
use crate::targeting::{self, TargetingRecord};
use crate::traffic::{Region, TickReport, TrafficGenerator};

use super::command::{Command, LogEntry, StationState};
use super::message::{
    Envelope, MemberInfo, ServerMessage, SharedState, Source, StationRole, ViewerId,
};

const TRAFFIC_STREAM: &str = "traffic";
const TARGETING_STREAM: &str = "targeting";

/// Authoritative state of one room. Every method returns the broadcasts the
/// mutation produced, in the order they must be published.
pub struct RoomSession {
    key: String,
    members: Vec<MemberInfo>,
    traffic: TrafficGenerator,
    pins: PinState,
    targets: Vec<TargetingRecord>,
    station: StationState,
    vessel: VesselProfile,
    rng: RngManager,
}

impl RoomSession {
    pub fn new(
        key: impl Into<String>,
        region: Region,
        seed: Option<u64>,
        vessel: VesselProfile,
    ) -> Self {
        let mut rng = RngManager::new(seed);
        let traffic = TrafficGenerator::new(region, &mut rng.stream(TRAFFIC_STREAM));
        let mut session = Self {
            key: key.into(),
            members: Vec::new(),
            traffic,
            pins: PinState::new(),
            targets: Vec::new(),
            station: StationState::default(),
            vessel,
            rng,
        };
        session.retarget();
        session
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Adds or re-registers a viewer. The earliest remaining member is the
    /// owner.
    pub fn add_member(&mut self, viewer: ViewerId, role: StationRole, name: String) -> Envelope {
        match self.members.iter_mut().find(|m| m.viewer_id == viewer) {
            Some(member) => {
                member.role = role;
                member.name = name;
            }
            None => self.members.push(MemberInfo {
                viewer_id: viewer,
                role,
                name,
            }),
        }
        Envelope::to_room(Source::Server, self.membership())
    }

    /// Returns `None` when `viewer` was not a member.
    pub fn remove_member(&mut self, viewer: ViewerId) -> Option<Envelope> {
        let before = self.members.len();
        self.members.retain(|member| member.viewer_id != viewer);
        if self.members.len() == before {
            return None;
        }
        Some(Envelope::to_room(Source::Server, self.membership()))
    }

    pub fn apply(
        &mut self,
        viewer: ViewerId,
        command: Command,
    ) -> Result<Vec<Envelope>, CommandError> {
        command.validate()?;
        let source = Source::Viewer(viewer);
        let mut effects = Vec::new();

        match &command {
            Command::SetRegion(region) => {
                let size = self
                    .traffic
                    .initialize(*region, &mut self.rng.stream(TRAFFIC_STREAM));
                for event in self.pins.clear() {
                    effects.push(ServerMessage::from_annotation(&self.key, event));
                }
                info!(room = %self.key, region = %region, size, "traffic regenerated");
                self.retarget();
                effects.push(self.population_update(None));
                effects.push(self.targeting_update());
            }
            Command::TogglePin(ship) => {
                let events = self.pins.toggle(*ship, self.traffic.ships())?;
                for event in events {
                    effects.push(ServerMessage::from_annotation(&self.key, event));
                }
                self.retarget();
                effects.push(self.targeting_update());
            }
            Command::ClearPins => {
                for event in self.pins.clear() {
                    effects.push(ServerMessage::from_annotation(&self.key, event));
                }
                self.retarget();
                effects.push(self.targeting_update());
            }
            Command::SetAlert(level) => self.station.alert = *level,
            Command::SetPower(setting) => self.station.power.set(setting.system, setting.level),
            Command::SetFrequency(mhz) => self.station.comms.frequency = *mhz,
            Command::SendMessage(text) => {
                let member = self.members.iter().find(|m| m.viewer_id == viewer);
                self.station.comms.push(LogEntry {
                    from: member
                        .map(|m| m.name.clone())
                        .unwrap_or_else(|| viewer.to_string()),
                    station: member.map(|m| m.role),
                    text: text.trim().to_string(),
                    at: Utc::now(),
                });
            }
        }
        debug!(room = %self.key, %viewer, field = command.field_path(), "command applied");

        let mut envelopes = Vec::with_capacity(effects.len() + 2);
        envelopes.push(Envelope::to_others(
            source,
            ServerMessage::CommandRelay {
                room: self.key.clone(),
                command,
            },
        ));
        envelopes.extend(
            effects
                .into_iter()
                .map(|message| Envelope::to_room(source, message)),
        );
        envelopes.push(Envelope::to_room(source, self.snapshot_message()));
        Ok(envelopes)
    }

    /// One generator step followed by a fresh projection.
    pub fn advance(&mut self) -> (TickReport, Vec<Envelope>) {
        let pins = &self.pins;
        let report = self.traffic.tick(
            |id| pins.is_pinned(id),
            &mut self.rng.stream(TRAFFIC_STREAM),
        );
        debug!(
            room = %self.key,
            tick = report.tick,
            departed = report.departed.len(),
            arrived = report.arrived.len(),
            population = report.population,
            "traffic tick"
        );
        self.retarget();
        let envelopes = vec![
            Envelope::to_room(Source::Generator, self.population_update(Some(report.clone()))),
            Envelope::to_room(Source::Generator, self.targeting_update()),
        ];
        (report, envelopes)
    }

    pub fn snapshot(&self) -> SharedState {
        SharedState {
            region: self.traffic.region(),
            tick: self.traffic.current_tick(),
            ships: self.traffic.ships().to_vec(),
            pins: self.pins.clone(),
            targets: self.targets.clone(),
            station: self.station.clone(),
            vessel: self.vessel.clone(),
        }
    }

    pub fn snapshot_message(&self) -> ServerMessage {
        ServerMessage::StateSnapshot {
            room: self.key.clone(),
            state: self.snapshot(),
        }
    }

    pub fn membership(&self) -> ServerMessage {
        ServerMessage::MembershipUpdate {
            room: self.key.clone(),
            members: self.members.clone(),
            owner: self.owner(),
        }
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn owner(&self) -> Option<ViewerId> {
        self.members.first().map(|member| member.viewer_id)
    }

    pub fn is_member(&self, viewer: ViewerId) -> bool {
        self.members.iter().any(|member| member.viewer_id == viewer)
    }

    pub fn traffic(&self) -> &TrafficGenerator {
        &self.traffic
    }

    pub fn pins(&self) -> &PinState {
        &self.pins
    }

    pub fn targets(&self) -> &[TargetingRecord] {
        &self.targets
    }

    pub fn station(&self) -> &StationState {
        &self.station
    }

    fn retarget(&mut self) {
        self.targets = targeting::project(
            self.traffic.ships(),
            &self.pins,
            &mut self.rng.stream(TARGETING_STREAM),
        );
    }

    fn population_update(&self, report: Option<TickReport>) -> ServerMessage {
        ServerMessage::PopulationUpdate {
            room: self.key.clone(),
            region: self.traffic.region(),
            tick: self.traffic.current_tick(),
            report,
            ships: self.traffic.ships().to_vec(),
            pins: self.pins.clone(),
        }
    }

    fn targeting_update(&self) -> ServerMessage {
        ServerMessage::TargetingUpdate {
            room: self.key.clone(),
            targets: self.targets.clone(),
        }
    }
}
