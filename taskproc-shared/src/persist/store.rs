/// Event sink/source contract
///
/// A [`Persister`] durably stores events keyed by task id and reads
/// them back in time order. The framework itself never persists; a
/// runner or service wires a persister next to the event queue when
/// history must outlive the process.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::event::Event;
use crate::persist::serialization::{event_to_item, item_to_event, Item, PersistError};
use crate::task_id;

/// Durable event sink and source
#[async_trait]
pub trait Persister: Send + Sync {
    /// Durably stores one event keyed by its task id
    async fn write(&self, event: &Event) -> Result<(), PersistError>;

    /// Returns the time-ordered events previously written for a task
    async fn read(&self, task_id: &str) -> Result<Vec<Event>, PersistError>;
}

/// Map-backed persister
///
/// Holds the encoded storage items in memory, keyed by the persisted
/// composite rendering of the task id. Useful in tests and as the
/// reference for what a real store must round-trip.
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    items: Mutex<HashMap<String, Vec<Item>>>,
}

impl InMemoryPersister {
    pub fn new() -> Self {
        InMemoryPersister::default()
    }
}

#[async_trait]
impl Persister for InMemoryPersister {
    async fn write(&self, event: &Event) -> Result<(), PersistError> {
        let item = event_to_item(event)?;
        let key = task_id::to_composite(&event.task_id);
        self.items
            .lock()
            .expect("persister lock poisoned")
            .entry(key)
            .or_default()
            .push(item);
        Ok(())
    }

    async fn read(&self, task_id: &str) -> Result<Vec<Event>, PersistError> {
        let key = task_id::to_composite(task_id);
        let items = self
            .items
            .lock()
            .expect("persister lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default();

        let mut events = items
            .iter()
            .map(item_to_event)
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let persister = InMemoryPersister::new();

        let staging = Event::task("fake_name.u1", "TASK_STAGING");
        let finished = Event::task("fake_name.u1", "TASK_FINISHED").with_outcome(true, true);

        persister.write(&staging).await.unwrap();
        persister.write(&finished).await.unwrap();

        let events = persister.read("fake_name.u1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].platform_type, "TASK_STAGING");
        assert_eq!(events[1].platform_type, "TASK_FINISHED");
        assert!(events[1].terminal);
    }

    #[tokio::test]
    async fn test_read_unknown_task_is_empty() {
        let persister = InMemoryPersister::new();
        let events = persister.read("fake_name.unknown").await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_reads_are_keyed_by_task_id() {
        let persister = InMemoryPersister::new();
        persister
            .write(&Event::task("a.u1", "TASK_RUNNING"))
            .await
            .unwrap();
        persister
            .write(&Event::task("b.u2", "TASK_RUNNING"))
            .await
            .unwrap();

        let events = persister.read("a.u1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].task_id, "a.u1");
    }
}
