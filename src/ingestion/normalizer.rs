use chrono::{DateTime, Utc};

use crate::events::{Event, EventKind};
use crate::parsing::{KillRecord, LogMarker, LogRecord};

/// Weapons the game reports for self-inflicted deaths.
pub const SUICIDE_WEAPONS: [&str; 2] = ["suicide_by_relocation", "falling"];

/// A kill row is a suicide when actor and victim are the same player (by id,
/// or by name when neither id is present) or the weapon is a suicide weapon.
pub fn is_suicide(record: &KillRecord) -> bool {
    let weapon = record.weapon.trim();
    if SUICIDE_WEAPONS.iter().any(|w| w.eq_ignore_ascii_case(weapon)) {
        return true;
    }
    match (&record.actor_id, &record.victim_id) {
        (Some(actor), Some(victim)) => actor == victim,
        (None, None) => !record.actor_name.is_empty() && record.actor_name == record.victim_name,
        _ => false,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Rows without a timestamp are stamped with `ingested_at` and marked as
/// estimated.
pub fn kill_event(record: &KillRecord, source_id: &str, ingested_at: DateTime<Utc>) -> Event {
    let kind = if is_suicide(record) {
        EventKind::Suicide
    } else {
        EventKind::Kill
    };
    let mut event = Event::new(
        kind,
        record.timestamp.unwrap_or(ingested_at),
        source_id,
        record.file.as_str(),
        record.line_number,
    );
    event.actor_name = non_empty(&record.actor_name);
    event.actor_id = record.actor_id.clone();
    event.victim_name = non_empty(&record.victim_name);
    event.victim_id = record.victim_id.clone();
    event.weapon = non_empty(&record.weapon);
    event.distance = record.distance;
    event.platform = record.platform.clone();
    event.victim_platform = record.victim_platform.clone();
    event.timestamp_estimated = record.timestamp.is_none();
    event
}

/// Player lifecycle markers become connection events, the rest world events.
/// `detail` carries the action or the new state.
pub fn log_event(record: &LogRecord, source_id: &str) -> Event {
    let arg = |i: usize| record.args.get(i).and_then(|a| non_empty(a));
    let kind = if record.marker.is_connection() {
        EventKind::Connection
    } else {
        EventKind::WorldEvent
    };
    let mut event = Event::new(
        kind,
        record.timestamp,
        source_id,
        record.file.as_str(),
        record.line_number,
    );
    let marker = record.marker.as_str();

    match record.marker {
        LogMarker::PlayerRegistered | LogMarker::PlayerUnregistered => {
            event.actor_id = arg(0);
            event.detail = Some(marker.to_string());
        }
        LogMarker::PlayerLogin => {
            event.actor_name = arg(0);
            event.actor_id = arg(1);
            event.detail = Some(marker.to_string());
        }
        LogMarker::PlayerKick => {
            event.actor_name = arg(0);
            event.actor_id = arg(1);
            event.detail = Some(match arg(2) {
                Some(message) => format!("{}: {}", marker, message),
                None => marker.to_string(),
            });
        }
        LogMarker::Airdrop => {
            event.detail = arg(0).map(|state| format!("{} {}", marker, state.to_lowercase()));
        }
        LogMarker::MissionState
        | LogMarker::Helicrash
        | LogMarker::RoamingTrader
        | LogMarker::Convoy => {
            event.location = arg(0);
            event.detail = arg(1).map(|state| format!("{} {}", marker, state.to_lowercase()));
        }
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(actor: &str, actor_id: Option<&str>, victim: &str, victim_id: Option<&str>, weapon: &str) -> KillRecord {
        KillRecord {
            timestamp: Some(Utc.with_ymd_and_hms(2025, 5, 9, 11, 58, 37).unwrap()),
            actor_name: actor.to_string(),
            actor_id: actor_id.map(str::to_string),
            victim_name: victim.to_string(),
            victim_id: victim_id.map(str::to_string),
            weapon: weapon.to_string(),
            distance: Some(100.0),
            platform: Some("PC".to_string()),
            victim_platform: None,
            line_number: 1,
            file: "a.csv".to_string(),
        }
    }

    #[test]
    fn scenario_a_row_becomes_a_kill() {
        let r = record("TestKiller", Some("12345"), "TestVictim", Some("67890"), "AK47");
        let e = kill_event(&r, "1", Utc::now());
        assert_eq!(e.kind, EventKind::Kill);
        assert_eq!(e.actor_name.as_deref(), Some("TestKiller"));
        assert_eq!(e.actor_id.as_deref(), Some("12345"));
        assert_eq!(e.victim_id.as_deref(), Some("67890"));
        assert_eq!(e.weapon.as_deref(), Some("AK47"));
        assert_eq!(e.distance, Some(100.0));
        assert_eq!(e.platform.as_deref(), Some("PC"));
        assert_eq!(e.timestamp, r.timestamp.unwrap());
    }

    #[test]
    fn suicide_rules() {
        assert!(is_suicide(&record("A", Some("1"), "A", Some("1"), "AK47")));
        assert!(is_suicide(&record("A", Some("1"), "B", Some("2"), "falling")));
        assert!(is_suicide(&record("A", Some("1"), "B", Some("2"), "Suicide_By_Relocation")));
        assert!(is_suicide(&record("A", None, "A", None, "knife")));
        assert!(!is_suicide(&record("A", Some("1"), "A", Some("2"), "knife")));
        assert!(!is_suicide(&record("A", Some("1"), "B", None, "knife")));
        assert_eq!(
            kill_event(&record("A", Some("1"), "A", Some("1"), "x"), "1", Utc::now()).kind,
            EventKind::Suicide
        );
    }

    #[test]
    fn missing_timestamp_uses_ingestion_time() {
        let mut r = record("TestKiller", None, "TestVictim", None, "AK47");
        r.timestamp = None;
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let event = kill_event(&r, "1", now);
        assert_eq!(event.timestamp, now);
        assert!(event.timestamp_estimated);
        assert!(!kill_event(&record("A", None, "B", None, "x"), "1", now).timestamp_estimated);
    }

    #[test]
    fn log_records_map_to_connection_and_world_events() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 9, 12, 0, 0).unwrap();
        let log = |marker, args: &[&str]| LogRecord {
            timestamp: ts,
            marker,
            args: args.iter().map(|s| s.to_string()).collect(),
            line_number: 3,
            file: "Deadside.log".to_string(),
        };

        let login = log_event(&log(LogMarker::PlayerLogin, &["Survivor", "00ab"]), "1");
        assert_eq!(login.kind, EventKind::Connection);
        assert_eq!(login.actor_name.as_deref(), Some("Survivor"));
        assert_eq!(login.detail.as_deref(), Some("login"));

        let kick = log_event(&log(LogMarker::PlayerKick, &["Griefer", "", "Kicked"]), "1");
        assert_eq!(kick.actor_id, None);
        assert_eq!(kick.detail.as_deref(), Some("kick: Kicked"));

        let mission = log_event(&log(LogMarker::MissionState, &["GA_Mis_1", "READY"]), "1");
        assert_eq!(mission.kind, EventKind::WorldEvent);
        assert_eq!(mission.location.as_deref(), Some("GA_Mis_1"));
        assert_eq!(mission.detail.as_deref(), Some("mission ready"));

        let drop = log_event(&log(LogMarker::Airdrop, &["Dropping"]), "1");
        assert_eq!(drop.detail.as_deref(), Some("airdrop dropping"));
        assert_eq!(drop.origin_line, 3);
    }
}
