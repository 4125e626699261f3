use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::database::models::Access;

/// Frames queued per session before broadcasts start being dropped for it
pub const OUTBOUND_CAPACITY: usize = 256;

/// One authenticated connection as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    #[serde(skip)]
    pub id: Uuid,
    pub peer_address: SocketAddr,
    pub access: Access,
    pub login: String,
    pub connected_at: i64,
}

struct Entry {
    info: SessionInfo,
    outbound: mpsc::Sender<Vec<u8>>,
    evict: Arc<Notify>,
}

/// Live sessions, keyed by an id handed out at registration
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. `outbound` feeds its writer task; `evict` is notified
    /// when an admin forces it off.
    pub async fn register(
        &self,
        info: SessionInfo,
        outbound: mpsc::Sender<Vec<u8>>,
        evict: Arc<Notify>,
    ) {
        let id = info.id;
        self.sessions.write().await.insert(id, Entry { info, outbound, evict });
    }

    pub async fn deregister(&self, id: Uuid) -> Option<SessionInfo> {
        self.sessions.write().await.remove(&id).map(|entry| entry.info)
    }

    /// Snapshot of every session, oldest first
    pub async fn online(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.read().await.values().map(|entry| entry.info.clone()).collect();
        sessions.sort_by_key(|session| (session.connected_at, session.peer_address));
        sessions
    }

    /// Queue `frame` on every session. A full or closed queue only skips that
    /// session. Returns how many sessions accepted the frame.
    pub async fn broadcast(&self, frame: &[u8]) -> usize {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;

        for entry in sessions.values() {
            match entry.outbound.try_send(frame.to_vec()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(peer = %entry.info.peer_address, "outbound queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(peer = %entry.info.peer_address, "session closing, event dropped");
                }
            }
        }

        delivered
    }

    /// Ask every session from `peer` to close. Returns how many matched.
    pub async fn evict(&self, peer: SocketAddr) -> usize {
        let sessions = self.sessions.read().await;
        let mut matched = 0;

        for entry in sessions.values().filter(|entry| entry.info.peer_address == peer) {
            entry.evict.notify_one();
            matched += 1;
        }

        matched
    }
}
