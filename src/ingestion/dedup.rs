use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::events::{DedupKey, Event};

/// Keys of events delivered since the last watermark advance, with the
/// event timestamp so the window can be pruned as the watermark moves.
#[derive(Debug, Default, Clone)]
pub struct DedupWindow {
    seen: HashMap<DedupKey, DateTime<Utc>>,
}

impl DedupWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains_key(key)
    }

    pub fn insert(&mut self, key: DedupKey, timestamp: DateTime<Utc>) {
        self.seen.insert(key, timestamp);
    }

    /// Forgets keys strictly older than `watermark`; events that old are
    /// dropped by the watermark filter anyway. Returns how many went.
    pub fn prune_older_than(&mut self, watermark: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, ts| *ts >= watermark);
        before - self.seen.len()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Result of [`admit`].
#[derive(Debug, Default)]
pub struct Admission {
    pub events: Vec<Event>,
    pub below_watermark: usize,
    pub duplicates: usize,
}

/// Keeps the events at or after `floor` whose key is neither in `window` nor
/// repeated earlier in the batch, sorted ascending by timestamp. The sort is
/// stable so equal timestamps keep file order.
pub fn admit(events: Vec<Event>, floor: Option<DateTime<Utc>>, window: &DedupWindow) -> Admission {
    let mut admission = Admission::default();
    let mut batch: HashSet<DedupKey> = HashSet::new();

    for event in events {
        if floor.map(|f| event.timestamp < f).unwrap_or(false) {
            admission.below_watermark += 1;
            continue;
        }
        let key = event.dedup_key();
        if window.contains(&key) || !batch.insert(key) {
            admission.duplicates += 1;
            continue;
        }
        admission.events.push(event);
    }
    admission.events.sort_by_key(|e| e.timestamp);
    admission
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64, actor: &str, line: usize) -> Event {
        let base = Utc.with_ymd_and_hms(2025, 5, 9, 12, 0, 0).unwrap();
        let mut e = Event::new(EventKind::Kill, base + Duration::seconds(secs), "1", "f.csv", line);
        e.actor_name = Some(actor.to_string());
        e.victim_name = Some("V".to_string());
        e
    }

    #[test]
    fn floor_window_and_batch_duplicates_are_dropped() {
        let mut window = DedupWindow::new();
        let seen = at(10, "A", 1);
        window.insert(seen.dedup_key(), seen.timestamp);

        let floor = Some(at(5, "x", 0).timestamp);
        let batch = vec![at(30, "C", 4), at(10, "A", 1), at(1, "B", 2), at(20, "D", 3), at(20, "D", 9)];
        let admission = admit(batch, floor, &window);

        assert_eq!(admission.below_watermark, 1);
        assert_eq!(admission.duplicates, 2);
        let actors: Vec<_> = admission
            .events
            .iter()
            .map(|e| e.actor_name.clone().unwrap())
            .collect();
        assert_eq!(actors, vec!["D", "C"]);
    }

    #[test]
    fn events_at_the_watermark_are_kept() {
        let e = at(10, "A", 1);
        let admission = admit(vec![e.clone()], Some(e.timestamp), &DedupWindow::new());
        assert_eq!(admission.events.len(), 1);
    }

    #[test]
    fn equal_timestamps_keep_file_order() {
        let admission = admit(
            vec![at(10, "first", 1), at(10, "second", 2), at(5, "early", 3)],
            None,
            &DedupWindow::new(),
        );
        let lines: Vec<_> = admission.events.iter().map(|e| e.origin_line).collect();
        assert_eq!(lines, vec![3, 1, 2]);
    }

    #[test]
    fn pruning_follows_the_watermark() {
        let mut window = DedupWindow::new();
        for (i, secs) in [1, 5, 10].iter().enumerate() {
            let e = at(*secs, "A", i);
            window.insert(e.dedup_key(), e.timestamp);
        }
        assert_eq!(window.prune_older_than(at(5, "x", 0).timestamp), 1);
        assert_eq!(window.len(), 2);
        window.clear();
        assert!(window.is_empty());
    }
}
