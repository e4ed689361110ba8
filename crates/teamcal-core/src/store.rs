use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datemath;
use crate::event::Event;
use crate::filter::OwnerFilter;
use crate::storage::KeyValueStore;

pub const DEFAULT_STORAGE_KEY: &str = "twc_events_v1";

/// Sole owner of the event collection. Every mutation re-sorts by
/// `(date, start)` and writes the whole collection back under one key.
#[derive(Debug)]
pub struct EventStore<S: KeyValueStore> {
    storage: S,
    key: String,
    events: Vec<Event>,
}

impl<S: KeyValueStore> EventStore<S> {
    #[tracing::instrument(skip(storage))]
    pub fn open(storage: S, key: &str) -> Self {
        let mut store = Self {
            storage,
            key: key.to_string(),
            events: Vec::new(),
        };
        store.events = store.load();
        info!(key = %store.key, count = store.events.len(), "opened event store");
        store
    }

    /// Reads the persisted collection. A missing key, an unreadable backend,
    /// or a blob that is not a JSON array of events all yield an empty list:
    /// an empty calendar is preferred over a failure, and the next mutation
    /// overwrites the bad blob.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> Vec<Event> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no persisted events");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "event storage unreadable; treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Event>>(&raw) {
            Ok(events) => {
                let total = events.len();
                let mut events: Vec<Event> =
                    events.into_iter().filter_map(normalize_times).collect();
                if events.len() != total {
                    warn!(dropped = total - events.len(), "dropped persisted events with bad times");
                }
                sort_canonical(&mut events);
                debug!(count = events.len(), "loaded persisted events");
                events
            }
            Err(err) => {
                warn!(error = %err, "persisted events are corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    /// Discards in-memory state and re-reads the backend.
    pub fn reload(&mut self) {
        self.events = self.load();
    }

    #[tracing::instrument(skip(self, event), fields(id = %event.id, date = %event.date))]
    pub fn add(&mut self, event: Event) -> anyhow::Result<()> {
        self.events.push(event);
        sort_canonical(&mut self.events);
        info!(count = self.events.len(), "event added");
        self.persist()
    }

    /// Removes the event with `id`. An unknown id leaves the collection
    /// untouched. Returns whether an event was removed.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn remove(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let before = self.events.len();
        self.events.retain(|event| event.id != id);
        let removed = self.events.len() != before;
        info!(removed, count = self.events.len(), "remove requested");
        self.persist()?;
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) -> anyhow::Result<()> {
        info!(before = self.events.len(), "clearing all events");
        self.events.clear();
        self.persist()
    }

    pub fn list_for_date(&self, date: NaiveDate, filter: &OwnerFilter) -> Vec<Event> {
        let mut out: Vec<Event> = self
            .events
            .iter()
            .filter(|event| event.date == date && filter.matches(&event.owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.start.cmp(&b.start));
        out
    }

    pub fn get(&self, id: Uuid) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&self.events)?;
        self.storage.set(&self.key, &serialized)
    }
}

/// Rewrites `start`/`end` as zero-padded `HH:MM`. Events whose times do
/// not parse, or that end at or before they start, are rejected.
fn normalize_times(mut event: Event) -> Option<Event> {
    let (start, end) = match (
        datemath::minutes_of_day(&event.start),
        datemath::minutes_of_day(&event.end),
    ) {
        (Ok(start), Ok(end)) if end > start => (start, end),
        _ => {
            debug!(id = %event.id, start = %event.start, end = %event.end, "invalid persisted times");
            return None;
        }
    };
    event.start = datemath::format_minutes(start);
    event.end = datemath::format_minutes(end);
    Some(event)
}

/// Stable sort by `(date, start)`; ties keep insertion order.
fn sort_canonical(events: &mut [Event]) {
    events.sort_by(|a, b| (a.date, &a.start).cmp(&(b.date, &b.start)));
}
