//! Process-local queue backend.

use super::{MatchmakingQueue, QueueError, DEFAULT_QUEUE_NAME};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// FIFO kept in memory. Contents are lost on restart, so this backend suits
/// tests and single-process development setups.
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    entries: Mutex<VecDeque<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_name(DEFAULT_QUEUE_NAME)
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Consumer side: takes the head of the queue.
    pub async fn pop_front(&self) -> Option<String> {
        self.entries.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchmakingQueue for InMemoryQueue {
    async fn push(&self, identity: &str) -> Result<(), QueueError> {
        self.entries.lock().await.push_back(identity.to_string());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, QueueError> {
        Ok(self.entries.lock().await.iter().cloned().collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryQueue::new();
        queue.push("alice").await.unwrap();
        queue.push("bob").await.unwrap();
        queue.push("carol").await.unwrap();

        assert_eq!(queue.list().await.unwrap(), vec!["alice", "bob", "carol"]);
        assert_eq!(queue.pop_front().await.as_deref(), Some("alice"));
        assert_eq!(queue.list().await.unwrap(), vec!["bob", "carol"]);
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.name(), DEFAULT_QUEUE_NAME);
    }
}
