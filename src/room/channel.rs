use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::{info, warn};

use crate::error::CommandError;
use crate::traffic::TickReport;

use super::command::Command;
use super::message::{Envelope, ServerMessage, SharedState, StationRole, ViewerId};
use super::session::RoomSession;

pub type RoomHandle = Arc<Room>;

pub type EnvelopeStream =
    Pin<Box<dyn Stream<Item = Result<Envelope, BroadcastStreamRecvError>> + Send>>;

/// One room: the session behind its critical section plus the topic every
/// member listens on. Mutations publish before the lock is released, so the
/// topic order is the mutation order.
pub struct Room {
    key: String,
    session: Mutex<RoomSession>,
    topic: broadcast::Sender<Envelope>,
}

impl Room {
    pub fn new(session: RoomSession, capacity: usize) -> Self {
        let (topic, _) = broadcast::channel(capacity.max(1));
        Self {
            key: session.key().to_string(),
            session: Mutex::new(session),
            topic,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Registers `viewer` and returns its subscription together with the
    /// snapshot it should be sent first. Everyone, the joiner included, then
    /// receives the new roster.
    pub fn join(
        &self,
        viewer: ViewerId,
        role: StationRole,
        name: String,
    ) -> (Subscription, ServerMessage) {
        let mut session = self.lock();
        let subscription = Subscription {
            viewer: Some(viewer),
            rx: self.topic.subscribe(),
        };
        let snapshot = session.snapshot_message();
        let roster = session.add_member(viewer, role, name);
        info!(room = %self.key, %viewer, ?role, members = session.members().len(), "viewer joined");
        self.publish([roster]);
        (subscription, snapshot)
    }

    /// Returns whether `viewer` was a member.
    pub fn leave(&self, viewer: ViewerId) -> bool {
        let mut session = self.lock();
        match session.remove_member(viewer) {
            Some(roster) => {
                info!(room = %self.key, %viewer, members = session.members().len(), "viewer left");
                self.publish([roster]);
                true
            }
            None => false,
        }
    }

    pub fn apply(&self, viewer: ViewerId, command: Command) -> Result<(), CommandError> {
        let mut session = self.lock();
        let envelopes = session.apply(viewer, command)?;
        self.publish(envelopes);
        Ok(())
    }

    pub fn tick(&self) -> TickReport {
        let mut session = self.lock();
        let (report, envelopes) = session.advance();
        self.publish(envelopes);
        report
    }

    pub fn snapshot(&self) -> SharedState {
        self.lock().snapshot()
    }

    pub fn snapshot_message(&self) -> ServerMessage {
        self.lock().snapshot_message()
    }

    pub fn member_count(&self) -> usize {
        self.lock().members().len()
    }

    /// Read access for inspection; do not hold across await points.
    pub fn with_session<T>(&self, f: impl FnOnce(&RoomSession) -> T) -> T {
        f(&*self.lock())
    }

    /// A subscription that is not a member and sees every broadcast.
    pub fn observe(&self) -> Subscription {
        Subscription {
            viewer: None,
            rx: self.topic.subscribe(),
        }
    }

    fn publish(&self, envelopes: impl IntoIterator<Item = Envelope>) {
        for envelope in envelopes {
            // No receivers just means nobody is listening right now.
            let _ = self.topic.send(envelope);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoomSession> {
        // Commands validate before mutating; a poisoned session is still whole.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A viewer's handle on a room topic. Dropping it stops delivery.
pub struct Subscription {
    viewer: Option<ViewerId>,
    rx: broadcast::Receiver<Envelope>,
}

impl Subscription {
    pub fn viewer(&self) -> Option<ViewerId> {
        self.viewer
    }

    pub async fn recv(&mut self) -> Result<Envelope, RecvError> {
        loop {
            let envelope = self.rx.recv().await?;
            if envelope.visible_to(self.viewer) {
                return Ok(envelope);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<Envelope, TryRecvError> {
        loop {
            let envelope = self.rx.try_recv()?;
            if envelope.visible_to(self.viewer) {
                return Ok(envelope);
            }
        }
    }

    /// Everything currently queued, in order.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        loop {
            match self.try_recv() {
                Ok(envelope) => out.push(envelope),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscription lagged while draining");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return out,
            }
        }
    }

    pub fn into_stream(self) -> EnvelopeStream {
        let viewer = self.viewer;
        Box::pin(
            BroadcastStream::new(self.rx).filter(move |item| match item {
                Ok(envelope) => envelope.visible_to(viewer),
                Err(_) => true,
            }),
        )
    }
}
