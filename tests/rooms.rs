use std::time::Duration;

use bridgesim::room::{
    AlertLevel, Envelope, RoomRegistry, RoomSettings, ServerMessage, Source, StationRole,
    ViewerId,
};
use serde_json::{json, Value};

fn registry() -> RoomRegistry {
    RoomRegistry::new(RoomSettings {
        tick_interval: None,
        seed: Some(7),
        ..RoomSettings::default()
    })
}

fn kinds(envelopes: &[Envelope]) -> Vec<&'static str> {
    envelopes.iter().map(|e| e.message.kind()).collect()
}

fn wire(envelope: &Envelope) -> Value {
    serde_json::to_value(envelope).unwrap()
}

#[test]
fn join_returns_snapshot_and_broadcasts_roster() {
    let registry = registry();
    let (a, b) = (registry.next_viewer_id(), registry.next_viewer_id());

    let (mut sub_a, snapshot) = registry
        .join("alpha", a, StationRole::Command, "Ada")
        .unwrap();
    assert!(matches!(snapshot, ServerMessage::StateSnapshot { ref room, .. } if room == "alpha"));
    let (mut sub_b, _) = registry
        .join("alpha", b, StationRole::Tactical, "")
        .unwrap();

    let seen_by_a = sub_a.drain();
    assert_eq!(kinds(&seen_by_a), vec!["membership_update", "membership_update"]);
    let seen_by_b = sub_b.drain();
    assert_eq!(kinds(&seen_by_b), vec!["membership_update"]);

    let roster = wire(&seen_by_b[0]);
    assert_eq!(roster["source"], "server");
    assert_eq!(roster["owner"], json!(a.raw()));
    assert_eq!(roster["members"][1]["name"], b.to_string());
}

#[test]
fn command_relays_to_others_and_snapshots_everyone() {
    let registry = registry();
    let (a, b) = (registry.next_viewer_id(), registry.next_viewer_id());
    let (mut sub_a, _) = registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    let (mut sub_b, _) = registry.join("alpha", b, StationRole::Tactical, "Bo").unwrap();
    sub_a.drain();
    sub_b.drain();

    assert!(registry.submit("alpha", a, "set_alert", json!("red")));

    let seen_by_a = sub_a.drain();
    let seen_by_b = sub_b.drain();
    assert_eq!(kinds(&seen_by_a), vec!["state_snapshot"]);
    assert_eq!(kinds(&seen_by_b), vec!["command_relay", "state_snapshot"]);

    let relay = wire(&seen_by_b[0]);
    assert_eq!(relay["source"], a.to_string());
    assert_eq!(relay["command"], json!({ "kind": "set_alert", "value": "red" }));

    let snapshot = wire(&seen_by_a[0]);
    assert_eq!(snapshot["source"], a.to_string());
    assert_eq!(snapshot["state"]["alert"], "red");

    let state = registry.get("alpha").unwrap().snapshot();
    assert_eq!(state.station.alert, AlertLevel::Red);
}

#[test]
fn pin_toggle_emits_annotation_then_targeting() {
    let registry = registry();
    let a = registry.next_viewer_id();
    let (mut sub, _) = registry.join("alpha", a, StationRole::Tactical, "Ada").unwrap();
    sub.drain();
    let room = registry.get("alpha").unwrap();
    let ship = room.snapshot().ships[0].id;

    assert!(registry.submit("alpha", a, "toggle_pin", json!(ship.raw())));
    assert!(registry.submit("alpha", a, "toggle_pin", json!(ship.raw())));

    let seen = sub.drain();
    assert_eq!(
        kinds(&seen),
        vec![
            "annotation_event",
            "targeting_update",
            "state_snapshot",
            "annotation_event",
            "singleton_changed",
            "targeting_update",
            "state_snapshot",
        ]
    );
    let state = room.snapshot();
    assert_eq!(state.pins.double_pinned(), Some(ship));
    assert_eq!(state.targets[0].ship_id, ship);
}

#[test]
fn rejected_commands_change_nothing() {
    let registry = registry();
    let a = registry.next_viewer_id();
    let (mut sub, _) = registry.join("alpha", a, StationRole::Engineering, "Ada").unwrap();
    sub.drain();
    let before = registry.get("alpha").unwrap().snapshot();

    assert!(!registry.submit("alpha", a, "set_power", json!({ "system": "shields", "level": 150 })));
    assert!(!registry.submit("alpha", a, "set_frequency", json!(42.0)));
    assert!(!registry.submit("alpha", a, "warp_drive", Value::Null));
    assert!(!registry.submit("alpha", a, "set_alert", json!(3)));
    assert!(!registry.submit("alpha", a, "toggle_pin", json!(u64::MAX)));
    assert!(!registry.submit("nowhere", a, "clear_pins", Value::Null));

    assert!(sub.drain().is_empty());
    assert!(registry.get("nowhere").is_none());
    assert_eq!(registry.get("alpha").unwrap().snapshot(), before);
}

#[test]
fn disconnect_leaves_every_room_and_hands_over_ownership() {
    let registry = registry();
    let (a, b) = (registry.next_viewer_id(), registry.next_viewer_id());
    registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    registry.join("beta", a, StationRole::Command, "Ada").unwrap();
    let (mut sub_b, _) = registry.join("alpha", b, StationRole::Helm, "Bo").unwrap();
    sub_b.drain();

    assert_eq!(registry.disconnect(a), vec!["alpha".to_string(), "beta".to_string()]);

    let seen = sub_b.drain();
    assert_eq!(kinds(&seen), vec!["membership_update"]);
    assert_eq!(wire(&seen[0])["owner"], json!(b.raw()));
    let alpha = registry.get("alpha").unwrap();
    assert_eq!(alpha.member_count(), 1);
    assert!(registry.get("beta").is_none(), "empty room should be closed");
    assert!(registry.disconnect(a).is_empty());
}

#[test]
fn empty_rooms_close_but_default_stays() {
    let registry = registry();
    let a = registry.next_viewer_id();
    registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    registry.join("default", a, StationRole::Command, "Ada").unwrap();
    registry.get("alpha").unwrap().tick();

    assert!(registry.leave("alpha", a));
    assert!(registry.get("alpha").is_none());
    assert!(!registry.leave("alpha", a));

    assert!(registry.leave("default", a));
    assert_eq!(registry.get("default").unwrap().member_count(), 0);

    let (_, snapshot) = registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    match snapshot {
        ServerMessage::StateSnapshot { state, .. } => assert_eq!(state.tick, 0),
        other => panic!("expected a snapshot, got {}", other.kind()),
    }
}

#[test]
fn room_survives_a_panic_inside_its_lock() {
    let registry = registry();
    let room = registry.get_or_create("alpha");

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        room.with_session(|_| panic!("inspection failed"))
    }));
    assert!(outcome.is_err());

    let report = room.tick();
    assert_eq!(report.tick, 1);
    assert_eq!(room.snapshot().tick, 1);
}

#[test]
fn rooms_are_isolated() {
    let registry = registry();
    let (a, b) = (registry.next_viewer_id(), registry.next_viewer_id());
    let (mut sub_a, _) = registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    let (mut sub_b, _) = registry.join("beta", b, StationRole::Command, "Bo").unwrap();
    sub_a.drain();
    sub_b.drain();

    assert!(registry.submit("beta", b, "set_region", json!("wild_space")));

    assert!(sub_a.drain().is_empty());
    assert!(!sub_b.drain().is_empty());
    let summaries = registry.summaries();
    let names: Vec<_> = summaries.iter().map(|s| s.room.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta", "default"]);
    assert_ne!(summaries[0].region, summaries[1].region);
}

#[test]
fn generator_ticks_are_tagged_and_seen_by_observers() {
    let registry = registry();
    let room = registry.get_or_create("alpha");
    let mut observer = room.observe();
    assert_eq!(observer.viewer(), None);

    let report = room.tick();

    let seen = observer.drain();
    assert_eq!(kinds(&seen), vec!["population_update", "targeting_update"]);
    assert!(seen.iter().all(|e| e.source == Source::Generator));
    assert_eq!(report.tick, 1);
    assert_eq!(wire(&seen[0])["report"]["population"], json!(report.population));
}

#[test]
fn observers_see_relays_hidden_from_their_sender() {
    let registry = registry();
    let a = registry.next_viewer_id();
    let (mut sub_a, _) = registry.join("alpha", a, StationRole::Command, "Ada").unwrap();
    let mut observer = registry.get("alpha").unwrap().observe();
    sub_a.drain();

    assert!(registry.submit("alpha", a, "clear_pins", Value::Null));

    assert!(!kinds(&sub_a.drain()).contains(&"command_relay"));
    assert_eq!(kinds(&observer.drain())[0], "command_relay");
}

#[test]
fn seeded_rooms_replay_identically() {
    let first = registry().get_or_create("alpha").snapshot();
    let second = registry().get_or_create("alpha").snapshot();

    let shape = |state: &bridgesim::room::SharedState| -> Vec<_> {
        state
            .ships
            .iter()
            .map(|s| (s.id, s.kind(), s.designation.clone(), s.status, s.group_id))
            .collect()
    };
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(first.targets, second.targets);
}

#[tokio::test]
async fn background_ticker_advances_rooms() {
    let registry = RoomRegistry::new(RoomSettings {
        tick_interval: Some(Duration::from_millis(20)),
        seed: Some(11),
        ..RoomSettings::default()
    });
    let viewer = ViewerId::new(1);
    let (mut sub, _) = registry
        .join("alpha", viewer, StationRole::Science, "Ada")
        .unwrap();

    let update = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let envelope = sub.recv().await.unwrap();
            if envelope.source == Source::Generator {
                return envelope;
            }
        }
    })
    .await
    .expect("ticker never fired");

    assert_eq!(update.message.kind(), "population_update");
}
