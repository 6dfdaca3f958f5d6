use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver, Sender},
};

use crate::{model::LogEntry, store::MetadataStore};

// Request logging is fire-and-forget: the hot path hands an entry to a
// bounded queue and moves on. A full queue or a failed append drops the
// entry and bumps a visible counter instead of slowing the request.
#[derive(Clone)]
pub struct LogSink {
    sender: Sender<LogEntry>,
    receiver: Arc<Mutex<Receiver<LogEntry>>>,
    store: Arc<dyn MetadataStore>,
    dropped: Arc<AtomicU64>,
}

impl LogSink {
    pub fn new(store: Arc<dyn MetadataStore>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            store,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if self.sender.try_send(entry).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped_total = total, "log queue full, entry dropped");
        }
    }

    pub async fn drain(&self) {
        loop {
            let entry = self.receiver.lock().await.recv().await;
            match entry {
                Some(entry) => self.append(entry).await,
                None => return,
            }
        }
    }

    // Synchronously writes out everything queued so far; the runtime loop
    // above never idles long enough for tests to rely on it.
    pub async fn drain_pending(&self) -> usize {
        let mut written = 0;
        loop {
            let entry = self.receiver.lock().await.try_recv();
            match entry {
                Ok(entry) => {
                    self.append(entry).await;
                    written += 1;
                }
                Err(_) => return written,
            }
        }
    }

    async fn append(&self, entry: LogEntry) {
        if let Err(err) = self.store.append_log(entry).await {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(error = %err, dropped_total = total, "log append failed, entry dropped");
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::in_memory::InMemoryStore;

    fn entry(path: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            latency_ms: 3,
            credential: "ak_1".to_string(),
            error: None,
        }
    }

    #[tokio::test]
    async fn pushed_entries_reach_the_store() {
        let store = Arc::new(InMemoryStore::new());
        let sink = LogSink::new(store.clone(), 16);

        sink.push(entry("/a"));
        sink.push(entry("/b"));
        assert_eq!(sink.drain_pending().await, 2);

        let logs = store.recent_logs("ak_1", 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].path, "/b");
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_entries_and_counts_them() {
        let store = Arc::new(InMemoryStore::new());
        let sink = LogSink::new(store.clone(), 1);

        sink.push(entry("/kept"));
        sink.push(entry("/dropped-1"));
        sink.push(entry("/dropped-2"));

        assert_eq!(sink.dropped(), 2);
        assert_eq!(sink.drain_pending().await, 1);

        let logs = store.recent_logs("ak_1", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].path, "/kept");
    }
}
