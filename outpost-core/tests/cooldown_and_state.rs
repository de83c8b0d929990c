use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use outpost_core::{
    ActionKind, BotConfig, CooldownPolicy, Coordinate, Denylist, MemoryStateStore, StateStore,
    TimerKey, TimerRecord, TimerSet, TimerStore, may_run,
};

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn travel_timer_blocks_for_twice_the_reported_time() {
    let target = Coordinate::new(3, -4);
    let mut timers = TimerStore::new();
    timers.set(
        &TimerKey::target(ActionKind::Raid, target),
        TimerRecord::new(noon(), "0:45:00"),
    );
    let record = timers.get(&TimerKey::target(ActionKind::Raid, target));

    assert!(!may_run(record, noon() + TimeDelta::minutes(45)));
    assert!(!may_run(record, noon() + TimeDelta::minutes(89)));
    assert!(may_run(record, noon() + TimeDelta::minutes(90)));
    assert!(may_run(
        timers.get(&TimerKey::target(ActionKind::Raid, Coordinate::new(0, 0))),
        noon()
    ));
}

#[test]
fn construction_timers_use_the_exact_time() {
    let mut timers = TimerStore::new();
    timers.set(
        &TimerKey::new(ActionKind::Build, "7"),
        TimerRecord::new(noon(), "1:00:00"),
    );
    let later = noon() + TimeDelta::minutes(61);
    assert!(timers.any_pending(
        ActionKind::Build,
        CooldownPolicy::CONSTRUCTION,
        later - TimeDelta::minutes(2)
    ));
    assert!(!timers.any_pending(ActionKind::Build, CooldownPolicy::CONSTRUCTION, later));
    assert!(timers.any_pending(ActionKind::Build, CooldownPolicy::TRAVEL, later));
    assert!(!timers.any_pending(ActionKind::Festival, CooldownPolicy::CONSTRUCTION, noon()));
}

#[test]
fn garbage_durations_never_block() {
    let record = TimerRecord::new(noon(), "soon");
    assert!(may_run(Some(&record), noon()));
}

#[test]
fn state_is_kept_per_village_and_set() {
    let mut store = MemoryStateStore::new();
    let mut timers = TimerStore::new();
    timers.set(
        &TimerKey::target(ActionKind::Trade, Coordinate::new(1, 1)),
        TimerRecord::new(noon(), "0:10:00"),
    );
    store
        .save_timers("North", TimerSet::Travel, &timers)
        .unwrap();

    assert_eq!(store.load_timers("North", TimerSet::Travel).unwrap(), timers);
    assert!(store.load_timers("North", TimerSet::Construction).unwrap().is_empty());
    assert!(store.load_timers("South", TimerSet::Travel).unwrap().is_empty());
}

#[test]
fn denylist_entries_are_permanent_and_unique() {
    let target = Coordinate::new(-12, 30);
    let mut denylist = Denylist::new();
    assert!(denylist.record(target, "no village at these coordinates", noon()));
    assert!(!denylist.record(target, "again", noon() + TimeDelta::days(30)));
    assert_eq!(denylist.len(), 1);

    let mut store = MemoryStateStore::new();
    store.save_denylist(&denylist).unwrap();
    assert!(store.load_denylist().unwrap().is_blocked(target));
}

#[test]
fn hand_written_denylist_files_load() {
    let denylist: Denylist = serde_json::from_str(
        r#"[{"targetMapId": [5, 5], "errorMessage": "banned"}, {"target": {"x": 1, "y": 2}}]"#,
    )
    .unwrap();
    assert!(denylist.is_blocked(Coordinate::new(5, 5)));
    assert!(denylist.is_blocked(Coordinate::new(1, 2)));
    assert!(!denylist.is_blocked(Coordinate::new(2, 1)));
}

#[test]
fn config_without_villages_is_valid() {
    let config = BotConfig::from_json(r#"{"villages": []}"#).unwrap();
    assert!(config.villages.is_empty());
    assert!(config.discovery.is_none());
}
