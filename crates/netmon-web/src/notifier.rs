//! Live update channel: a registry of connected viewers and the timer that
//! pokes them.
//!
//! The notifier never reads the store. Every tick it tells each viewer that
//! new data may exist; viewers re-query their window over HTTP. Each viewer's
//! WebSocket is owned by its own task, which receives [`Notice`]s over an
//! unbounded channel. A failed channel send means the viewer task is gone, so
//! the viewer is dropped from the registry on the spot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

use crate::state::AppState;

pub(crate) const GREETING: &str = "WebSocket connected - awaiting real-time updates";

/// What the broadcast side tells a viewer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notice {
    Update,
    Shutdown,
}

/// Server-to-viewer envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum Envelope<'a> {
    Connected { message: &'a str },
    Update,
}

impl Envelope<'_> {
    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"update"}"#.to_string())
    }
}

type Sender = mpsc::UnboundedSender<Notice>;

pub(crate) struct Notifier {
    viewers: Mutex<HashMap<u64, Sender>>,
    next_id: AtomicU64,
    /// Signalled whenever the registry becomes empty.
    idle: Notify,
}

/// Deregisters its viewer when dropped.
pub(crate) struct ViewerGuard {
    id: u64,
    notifier: Arc<Notifier>,
}

impl ViewerGuard {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let active = self.notifier.deregister(self.id);
        info!(viewer = self.id, active_viewers = active, "viewer disconnected");
    }
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self {
            viewers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            idle: Notify::new(),
        }
    }

    fn viewers(&self) -> MutexGuard<'_, HashMap<u64, Sender>> {
        self.viewers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a viewer. The guard removes it again; the receiver yields its notices.
    pub(crate) fn register(self: &Arc<Self>) -> (ViewerGuard, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = {
            let mut viewers = self.viewers();
            viewers.insert(id, tx);
            viewers.len()
        };
        info!(viewer = id, active_viewers = active, "viewer connected");
        (
            ViewerGuard {
                id,
                notifier: Arc::clone(self),
            },
            rx,
        )
    }

    /// Removes a viewer if still present; returns the remaining count.
    fn deregister(&self, id: u64) -> usize {
        let mut viewers = self.viewers();
        viewers.remove(&id);
        if viewers.is_empty() {
            self.idle.notify_waiters();
        }
        viewers.len()
    }

    pub(crate) fn active(&self) -> usize {
        self.viewers().len()
    }

    /// Sends `notice` to every viewer registered at call time.
    ///
    /// Viewers whose channel is closed are removed. Returns how many viewers
    /// the notice was delivered to.
    pub(crate) fn broadcast(&self, notice: Notice) -> usize {
        let snapshot: Vec<(u64, Sender)> = self
            .viewers()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(notice).is_ok() {
                delivered += 1;
            } else {
                gone.push(id);
            }
        }

        if !gone.is_empty() {
            let mut viewers = self.viewers();
            for id in &gone {
                viewers.remove(id);
            }
            debug!(dropped = gone.len(), active_viewers = viewers.len(), "dropped dead viewers");
            if viewers.is_empty() {
                self.idle.notify_waiters();
            }
        }
        delivered
    }

    /// Tells every viewer task to send a Close frame and finish.
    pub(crate) fn close_all(&self) -> usize {
        let n = self.broadcast(Notice::Shutdown);
        info!(viewers = n, "closing live connections");
        n
    }

    /// Waits until no viewer is registered. `false` if `limit` ran out first.
    pub(crate) async fn wait_idle(&self, limit: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                // Register interest before checking, so a wakeup in between is kept.
                notified.as_mut().enable();
                if self.active() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, drained).await.is_ok()
    }
}

/// Broadcasts [`Notice::Update`] every `interval` until the task is aborted.
pub(crate) async fn broadcast_loop(notifier: Arc<Notifier>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; viewers just got the greeting.
    tick.tick().await;

    loop {
        tick.tick().await;
        if notifier.active() == 0 {
            continue;
        }
        let delivered = notifier.broadcast(Notice::Update);
        debug!(delivered, "update broadcast");
    }
}

pub(crate) async fn handle_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let notifier = state.notifier.clone();
    ws.on_upgrade(move |socket| viewer_session(socket, notifier))
}

async fn viewer_session(mut socket: WebSocket, notifier: Arc<Notifier>) {
    let (guard, mut notices) = notifier.register();

    let greeting = Envelope::Connected { message: GREETING }.to_json();
    if socket.send(Message::Text(greeting.into())).await.is_err() {
        return;
    }
    let update = Envelope::Update.to_json();

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(Notice::Update) => {
                    if socket.send(Message::Text(update.clone().into())).await.is_err() {
                        debug!(viewer = guard.id(), "send failed");
                        break;
                    }
                }
                Some(Notice::Shutdown) | None => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: "server shutting down".into(),
                    };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Viewer payloads carry no meaning.
                Some(Ok(_)) => {}
            },
        }
    }
}
