//! Progress notifier: per-session event relay that never blocks producers.
//!
//! Each session keeps a bounded backlog for polling consumers and a
//! broadcast channel for live subscribers. When the backlog is full the
//! oldest event is dropped and counted. Publishing never waits on, or fails
//! because of, consumers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::models::{NotifierConfig, ProgressEvent, ProgressPayload, SequenceNumber, SessionId};

struct SessionQueue {
    backlog: VecDeque<ProgressEvent>,
    sender: broadcast::Sender<ProgressEvent>,
    dropped: u64,
    last_activity: Instant,
}

impl SessionQueue {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            backlog: VecDeque::with_capacity(capacity),
            sender,
            dropped: 0,
            last_activity: Instant::now(),
        }
    }
}

/// Live view of one session: backlog replay first, then live events.
pub struct Subscription {
    replay: VecDeque<ProgressEvent>,
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl Subscription {
    /// Next event, or `None` once the session is gone.
    ///
    /// A subscriber that falls behind the broadcast buffer skips the events
    /// it missed; they remain available through [`ProgressNotifier::drain`]
    /// while still in the backlog.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events already buffered, without waiting.
    pub fn try_next(&mut self) -> Option<ProgressEvent> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Session-scoped progress relay shared by every orchestration in the process.
pub struct ProgressNotifier {
    config: NotifierConfig,
    sequence: AtomicU64,
    sessions: RwLock<HashMap<SessionId, SessionQueue>>,
}

impl ProgressNotifier {
    /// Notifier with no sessions; sessions open on first publish or subscribe.
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            sequence: AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append an event to the session's backlog and relay it to live subscribers.
    pub async fn publish(
        &self,
        session_id: &SessionId,
        requirement_id: Uuid,
        payload: ProgressPayload,
    ) -> ProgressEvent {
        let mut sessions = self.sessions.write().await;
        let queue = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionQueue::new(self.config.queue_capacity));

        // Numbered under the lock so backlog order matches sequence order.
        let event = ProgressEvent {
            id: Uuid::new_v4(),
            sequence: SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst)),
            session_id: session_id.clone(),
            requirement_id,
            timestamp: chrono::Utc::now(),
            payload,
        };

        if queue.backlog.len() >= self.config.queue_capacity {
            queue.backlog.pop_front();
            queue.dropped += 1;
            tracing::debug!(session_id = %session_id, dropped = queue.dropped, "Progress backlog full, dropped oldest event");
        }
        queue.backlog.push_back(event.clone());
        queue.last_activity = Instant::now();

        // No subscribers is not an error.
        let _ = queue.sender.send(event.clone());
        event
    }

    /// Subscribe to a session, creating it if needed.
    pub async fn subscribe(&self, session_id: &SessionId) -> Subscription {
        let mut sessions = self.sessions.write().await;
        let queue = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionQueue::new(self.config.queue_capacity));
        queue.last_activity = Instant::now();
        Subscription {
            replay: queue.backlog.clone(),
            receiver: queue.sender.subscribe(),
        }
    }

    /// Take every buffered event of a session.
    pub async fn drain(&self, session_id: &SessionId) -> Vec<ProgressEvent> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(queue) => {
                queue.last_activity = Instant::now();
                queue.backlog.drain(..).collect()
            }
            None => Vec::new(),
        }
    }

    /// Events dropped from a session's backlog because it was full.
    pub async fn dropped(&self, session_id: &SessionId) -> u64 {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, |queue| queue.dropped)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Discard a session. Live subscribers see the end of their stream.
    pub async fn close_session(&self, session_id: &SessionId) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Remove sessions idle for longer than the configured timeout.
    pub async fn collect_idle(&self) -> usize {
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, queue| queue.last_activity.elapsed() <= idle_timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "Collected idle progress sessions");
        }
        removed
    }

    /// Run [`collect_idle`](Self::collect_idle) every sweep interval until cancelled.
    pub fn spawn_janitor(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.collect_idle().await;
                    }
                }
            }
        })
    }
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}
