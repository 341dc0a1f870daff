//! In-memory queue driver
//!
//! Same contract as the persistent drivers, backed by a `RwLock`-guarded map.
//! An optional per-queue capacity makes `push` decline items once a queue is
//! full, which is what the aggregate falls through on.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{
    normalize_queue_name, resolve_queue_name, ItemId, PushInput, QueueName, QueuedItem,
    DEFAULT_QUEUE,
};
use crate::error::{QueueError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, QueueDriver, TimeProvider};

#[derive(Error, Debug)]
enum MemoryStoreError {
    #[error("item {0} already stored")]
    DuplicateId(ItemId),
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    item: QueuedItem,
}

#[derive(Debug, Default)]
struct MemoryState {
    items: HashMap<ItemId, Entry>,
    next_seq: u64,
}

pub struct MemoryQueueDriver {
    state: RwLock<MemoryState>,
    default_queue: QueueName,
    capacity: Option<usize>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Default for MemoryQueueDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueueDriver {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            default_queue: DEFAULT_QUEUE.to_string(),
            capacity: None,
            id_provider: Arc::new(UuidProvider),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_default_queue(mut self, queue: &str) -> Self {
        self.default_queue = normalize_queue_name(queue);
        self
    }

    /// Decline pushes once a queue holds `capacity` items
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_providers(
        mut self,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        self.id_provider = id_provider;
        self.time_provider = time_provider;
        self
    }

    fn queue_name(&self, queue: Option<&str>) -> QueueName {
        resolve_queue_name(queue, &self.default_queue)
    }
}

#[async_trait]
impl QueueDriver for MemoryQueueDriver {
    async fn push(&self, input: PushInput, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue.or(input.queue_hint()));

        let item = match input {
            PushInput::Payload(payload) => QueuedItem::new(
                self.id_provider.generate_id(),
                &queue,
                payload,
                self.time_provider.now_secs(),
            ),
            PushInput::Queued(item) => item.with_queue(&queue).into_unclaimed(),
        };

        let mut state = self.state.write().await;

        if let Some(capacity) = self.capacity {
            let used = state
                .items
                .values()
                .filter(|e| e.item.queue() == queue)
                .count();
            if used >= capacity {
                debug!(queue = %queue, capacity, "Memory queue full, declining push");
                return Ok(None);
            }
        }

        if state.items.contains_key(item.id()) {
            return Err(QueueError::write(
                "push",
                MemoryStoreError::DuplicateId(item.id().to_string()),
            ));
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        state.items.insert(
            item.id().to_string(),
            Entry {
                seq,
                item: item.clone(),
            },
        );

        debug!(item_id = %item.id(), queue = %queue, "Pushed item");
        Ok(Some(item))
    }

    async fn pop(&self, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue);
        let mut state = self.state.write().await;

        // Most recently pushed unclaimed item first
        let candidate = state
            .items
            .values_mut()
            .filter(|e| e.item.queue() == queue && !e.item.is_claimed())
            .max_by_key(|e| e.seq);

        Ok(candidate.map(|entry| {
            entry.item = entry.item.clone().into_claimed();
            debug!(item_id = %entry.item.id(), queue = %queue, "Claimed item");
            entry.item.clone()
        }))
    }

    async fn release(&self, id: &str, queue: Option<&str>) -> Result<()> {
        let queue = self.queue_name(queue);
        let mut state = self.state.write().await;

        let owned = state
            .items
            .get(id)
            .map(|e| e.item.queue() == queue)
            .unwrap_or(false);
        if owned {
            state.items.remove(id);
            debug!(item_id = %id, queue = %queue, "Released item");
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue);
        let state = self.state.read().await;

        Ok(state
            .items
            .get(id)
            .filter(|e| e.item.queue() == queue)
            .map(|e| e.item.clone()))
    }

    async fn size(&self, queue: Option<&str>) -> Result<u64> {
        let queue = self.queue_name(queue);
        let state = self.state.read().await;

        Ok(state
            .items
            .values()
            .filter(|e| e.item.queue() == queue)
            .count() as u64)
    }

    async fn list_queues(&self) -> Result<Vec<QueueName>> {
        let state = self.state.read().await;
        let names: BTreeSet<QueueName> = state
            .items
            .values()
            .map(|e| e.item.queue().to_string())
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Payload;
    use serde_json::json;

    #[tokio::test]
    async fn test_push_pop_release() {
        let queue = MemoryQueueDriver::new();

        let pushed = queue
            .push(json!({"foo": "bar"}).into(), Some("Mail"))
            .await
            .unwrap()
            .expect("Should accept item");
        assert_eq!(pushed.queue(), "mail");

        let popped = queue.pop(Some("mail")).await.unwrap().expect("Should have item");
        assert_eq!(popped.id(), pushed.id());
        assert!(popped.is_claimed());

        // Claimed items are not handed out twice but still counted
        assert!(queue.pop(Some("mail")).await.unwrap().is_none());
        assert_eq!(queue.size(Some("mail")).await.unwrap(), 1);

        queue.release_item(&popped).await.unwrap();
        assert_eq!(queue.size(Some("mail")).await.unwrap(), 0);
        let gone = queue.find_by_id(popped.id(), Some("mail")).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_pop_is_lifo() {
        let queue = MemoryQueueDriver::new();
        for i in 0..3 {
            queue.push(json!(i).into(), None).await.unwrap();
        }

        let first = queue.pop(None).await.unwrap().unwrap();
        assert_eq!(first.payload().as_value(), &json!(2));
    }

    #[tokio::test]
    async fn test_capacity_declines_push() {
        let queue = MemoryQueueDriver::new().with_capacity(1);

        assert!(queue.push(json!(1).into(), None).await.unwrap().is_some());
        assert!(queue.push(json!(2).into(), None).await.unwrap().is_none());
        // Other queues have their own budget
        let other = queue.push(json!(3).into(), Some("other")).await.unwrap();
        assert!(other.is_some());
    }

    #[tokio::test]
    async fn test_repush_keeps_id_and_age() {
        let source = MemoryQueueDriver::new();
        let target = MemoryQueueDriver::new();

        let item = QueuedItem::new("fixed-id", "a", Payload::new(json!("x")), 1234);
        let moved = target
            .push(item.into(), Some("b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.id(), "fixed-id");
        assert_eq!(moved.created_at(), 1234);
        assert_eq!(moved.queue(), "b");

        // Without a queue the item's own queue is used
        let back = source.push(moved.into(), None).await.unwrap().unwrap();
        assert_eq!(back.queue(), "b");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_write_error() {
        let queue = MemoryQueueDriver::new();
        let item = QueuedItem::new("dup", "q", Payload::new(json!(null)), 1);

        queue.push(item.clone().into(), None).await.unwrap();
        let err = queue.push(item.into(), None).await.unwrap_err();
        assert!(matches!(err, QueueError::Write { .. }));
    }

    #[tokio::test]
    async fn test_release_scoped_to_queue() {
        let queue = MemoryQueueDriver::new();
        let item = queue.push(json!(1).into(), Some("a")).await.unwrap().unwrap();

        queue.release(item.id(), Some("b")).await.unwrap();
        assert_eq!(queue.size(Some("a")).await.unwrap(), 1);

        queue.release(item.id(), Some("a")).await.unwrap();
        queue.release(item.id(), Some("a")).await.unwrap();
        assert_eq!(queue.size(Some("a")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_queues_distinct() {
        let queue = MemoryQueueDriver::new();
        queue.push(json!(1).into(), Some("B")).await.unwrap();
        queue.push(json!(2).into(), Some("a")).await.unwrap();
        queue.push(json!(3).into(), Some("b")).await.unwrap();

        assert_eq!(queue.list_queues().await.unwrap(), vec!["a", "b"]);
    }
}
