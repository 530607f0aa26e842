use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use crate::platform::MessageRecord;

/// Bounded FIFO between the inbound listener and the poll endpoint.
///
/// `enqueue` waits while the queue is full, so a slow agent pushes back on
/// the update stream instead of losing messages. `drain` never waits.
pub struct RelayQueue {
    tx: mpsc::Sender<MessageRecord>,
    rx: Mutex<mpsc::Receiver<MessageRecord>>,
}

impl RelayQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub async fn enqueue(&self, record: MessageRecord) {
        // The receiver lives as long as `self`, so the send cannot fail.
        if let Err(e) = self.tx.send(record).await {
            error!("Relay queue closed, dropping message for chat {}", e.0.chat_id);
        }
    }

    /// Remove and return everything currently buffered, oldest first.
    pub async fn drain(&self) -> Vec<MessageRecord> {
        let mut rx = self.rx.lock().await;
        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        if !records.is_empty() {
            debug!("Drained {} message(s) from relay queue", records.len());
        }
        records
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(chat_id: &str, text: &str) -> MessageRecord {
        MessageRecord {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drain_returns_records_in_order() {
        let queue = RelayQueue::new(10);
        queue.enqueue(record("1", "first")).await;
        queue.enqueue(record("1", "second")).await;
        queue.enqueue(record("2", "third")).await;

        let texts: Vec<String> = queue.drain().await.into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(queue.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_empty_queue_returns_immediately() {
        let queue = RelayQueue::new(4);
        let drained = tokio::time::timeout(Duration::from_millis(100), queue.drain())
            .await
            .expect("drain should not wait");
        assert!(drained.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_waits_for_space() {
        let queue = Arc::new(RelayQueue::new(1));
        queue.enqueue(record("1", "a")).await;

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue(record("1", "b")).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());

        let first = queue.drain().await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "a");

        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("enqueue should complete after drain")
            .unwrap();
        let second = queue.drain().await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "b");
    }

    #[test]
    fn test_capacity() {
        assert_eq!(RelayQueue::new(100).capacity(), 100);
    }
}
