use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::Event;

/// Deterministic identity of an event.
///
/// Built from the source, kind, timestamp (millisecond precision), actor and
/// victim identity, weapon, location and detail. Origin file and line are not
/// part of the key, so the same kill read from a rotated copy collides. An
/// estimated timestamp changes on every read, so those events are keyed on
/// their origin instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn from_event(event: &Event) -> Self {
        let part = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_lowercase();
        let when = if event.timestamp_estimated {
            format!("{}:{}", event.origin_file, event.origin_line)
        } else {
            event.timestamp.timestamp_millis().to_string()
        };
        DedupKey(format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            event.source_id,
            event.kind.as_str(),
            when,
            part(&event.actor_id),
            part(&event.actor_name),
            part(&event.victim_id),
            part(&event.victim_name),
            part(&event.weapon),
            part(&event.location),
            part(&event.detail),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use chrono::{TimeZone, Utc};

    fn kill(line: usize) -> Event {
        let mut e = Event::new(
            EventKind::Kill,
            Utc.with_ymd_and_hms(2025, 5, 9, 11, 58, 37).unwrap(),
            "src-1",
            "/h_1/actual1/deathlogs/world_0/a.csv",
            line,
        );
        e.actor_name = Some("TestKiller".into());
        e.actor_id = Some("12345".into());
        e.victim_name = Some("TestVictim".into());
        e.victim_id = Some("67890".into());
        e.weapon = Some("AK47".into());
        e
    }

    #[test]
    fn same_content_different_origin_collides() {
        let a = kill(1);
        let mut b = kill(40);
        b.origin_file = "/h_1/actual1/deathlogs/world_1/b.csv".into();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn weapon_discriminates() {
        let a = kill(1);
        let mut b = kill(1);
        b.weapon = Some("M4".into());
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn location_discriminates_world_events() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 9, 11, 59, 0).unwrap();
        let mission = |name: &str| {
            let mut e = Event::new(EventKind::WorldEvent, ts, "src-1", "Deadside.log", 7);
            e.location = Some(name.into());
            e.detail = Some("mission ready".into());
            e
        };
        assert_ne!(mission("GA_Mis_1").dedup_key(), mission("GA_Mis_2").dedup_key());
    }

    #[test]
    fn estimated_timestamp_keys_on_origin() {
        let mut a = kill(3);
        a.timestamp_estimated = true;
        let mut b = a.clone();
        b.timestamp = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());

        let mut c = a.clone();
        c.origin_line = 4;
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn source_discriminates() {
        let a = kill(1);
        let mut b = kill(1);
        b.source_id = "src-2".into();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
