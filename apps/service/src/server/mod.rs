//! TCP front end: accept loop, handshake, per-session receive loops and
//! event broadcast.

pub mod sessions;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hostwatch_proto::{Credentials, FrameError, FrameReader, Response};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::models::{Access, unix_now};
use crate::database::{Database, StoreError};
use crate::dispatch::{Caller, Dispatcher};
use crate::events::{Event, EventLog};
use sessions::{OUTBOUND_CAPACITY, SessionInfo, SessionRegistry};

/// Timeouts and the built-in credential used by the connection manager
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub handshake_timeout: Duration,
    pub stall_timeout: Duration,
    pub admin: config::Admin,
}

impl ServerSettings {
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            handshake_timeout: Duration::from_secs(config.server.handshake_timeout_seconds.max(1)),
            stall_timeout: Duration::from_secs(config.server.stall_timeout_seconds.max(1)),
            admin: config.admin.clone(),
        }
    }
}

/// Result of the first frame of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthOutcome {
    Admitted { login: String, access: Access },
    WrongPassword { login: String },
    Unrecognized,
    Timeout,
}

struct Shared {
    database: Arc<dyn Database>,
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionRegistry>,
    events: Arc<EventLog>,
    settings: ServerSettings,
}

/// Owns the listening socket; dropping it stops accepting
pub struct Server {
    listener: TcpListener,
    context: Arc<Shared>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        settings: ServerSettings,
        database: Arc<dyn Database>,
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<SessionRegistry>,
        events: Arc<EventLog>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
        let context = Arc::new(Shared { database, dispatcher, sessions, events, settings });
        Ok(Self { listener, context })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever
    pub async fn run(self) {
        let events = self.context.events.subscribe();
        let forwarder = spawn_forwarder(events, self.context.sessions.clone());

        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "accepting connections");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let context = self.context.clone();
                    tokio::spawn(async move { context.serve(stream, peer).await });
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    if forwarder.is_finished() {
                        error!("event forwarder stopped");
                    }
                }
            }
        }
    }
}

/// Push every event to every session as a `33` envelope
fn spawn_forwarder(
    mut events: broadcast::Receiver<Event>,
    sessions: Arc<SessionRegistry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event forwarder lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let encoded = serde_json::to_value(&event)
                .map_err(FrameError::from)
                .and_then(|data| Response::event(data).to_frame());
            let frame = match encoded {
                Ok(frame) => frame,
                Err(e) => {
                    error!("failed to encode event: {e}");
                    continue;
                }
            };

            let delivered = sessions.broadcast(&frame).await;
            debug!(delivered, "event broadcast");
        }
    })
}

impl Shared {
    async fn serve(&self, stream: TcpStream, peer: SocketAddr) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FrameReader::with_stall_timeout(read_half, self.settings.stall_timeout);

        let (response, alarm) = match self.authenticate(&mut reader).await {
            AuthOutcome::Admitted { login, access } => {
                self.run_session(reader, write_half, peer, login, access).await;
                return;
            }
            AuthOutcome::Timeout => (
                Response::auth_timeout(),
                format!("Rejected connection from {peer}: handshake timeout"),
            ),
            AuthOutcome::WrongPassword { login } => (
                Response::auth_failed(),
                format!("Client at {peer} entered a wrong password for <{login}>"),
            ),
            AuthOutcome::Unrecognized => (
                Response::auth_failed(),
                format!("Rejected connection from {peer}: unrecognized or flood request"),
            ),
        };

        match response.to_frame() {
            Ok(frame) => {
                if let Err(e) = write_half.write_all(&frame).await {
                    debug!(%peer, "failed to send handshake rejection: {e}");
                }
            }
            Err(e) => error!("failed to encode handshake rejection: {e}"),
        }
        let _ = write_half.shutdown().await;
        self.events.alarm(alarm).await;
    }

    async fn authenticate(&self, reader: &mut FrameReader<OwnedReadHalf>) -> AuthOutcome {
        let frame = match timeout(self.settings.handshake_timeout, reader.read_frame()).await {
            Err(_) => return AuthOutcome::Timeout,
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => return AuthOutcome::Unrecognized,
            Ok(Err(e)) => {
                debug!("handshake frame rejected: {e}");
                return AuthOutcome::Unrecognized;
            }
        };

        match serde_json::from_slice::<Credentials>(&frame) {
            Ok(credentials) => self.check_credentials(&credentials).await,
            Err(_) => AuthOutcome::Unrecognized,
        }
    }

    async fn check_credentials(&self, credentials: &Credentials) -> AuthOutcome {
        let users = match self.database.list_users().await {
            Ok(users) => users,
            Err(e) => {
                warn!("could not load users, only the built-in admin can log in: {e}");
                Vec::new()
            }
        };

        let registered = users.iter().find(|user| user.login == credentials.login);
        if let Some(user) = registered.filter(|user| user.password == credentials.password) {
            return AuthOutcome::Admitted { login: user.login.clone(), access: user.access };
        }

        let admin = &self.settings.admin;
        if credentials.login == admin.login && credentials.password == admin.password {
            return AuthOutcome::Admitted { login: admin.login.clone(), access: Access::Admin };
        }

        if registered.is_some() || credentials.login == admin.login {
            AuthOutcome::WrongPassword { login: credentials.login.clone() }
        } else {
            AuthOutcome::Unrecognized
        }
    }

    async fn run_session(
        &self,
        mut reader: FrameReader<OwnedReadHalf>,
        write_half: OwnedWriteHalf,
        peer: SocketAddr,
        login: String,
        access: Access,
    ) {
        let (outbound, queue) = mpsc::channel(OUTBOUND_CAPACITY);
        match Response::auth_success().to_frame() {
            Ok(frame) => {
                // The queue is empty, so this cannot wait.
                let _ = outbound.try_send(frame);
            }
            Err(e) => {
                error!("failed to encode auth success: {e}");
                return;
            }
        }
        let writer = tokio::spawn(write_loop(write_half, queue, peer));

        let evict = Arc::new(Notify::new());
        let info = SessionInfo {
            id: Uuid::new_v4(),
            peer_address: peer,
            access,
            login: login.clone(),
            connected_at: unix_now(),
        };
        self.sessions.register(info.clone(), outbound.clone(), evict.clone()).await;
        let peer_text = peer.to_string();
        self.events.user_event(&login, access, &peer_text, format!("connected from {peer}")).await;

        let caller = Caller { login: login.clone(), access, peer };
        loop {
            let frame = tokio::select! {
                _ = evict.notified() => {
                    info!(%peer, %login, "session evicted");
                    break;
                }
                frame = reader.read_frame() => frame,
            };

            let request = match frame {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    debug!(%peer, "closing session: {e}");
                    break;
                }
            };

            let response = self.dispatcher.handle(&request, &caller).await;
            match response.to_frame() {
                Ok(frame) => {
                    if outbound.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("failed to encode response: {e}"),
            }
        }

        self.sessions.deregister(info.id).await;
        drop(outbound);
        drop(reader);
        if let Err(e) = writer.await {
            warn!(%peer, "session writer panicked: {e}");
        }

        let message = format!("disconnected from {peer}");
        self.events.user_event(&login, access, &peer_text, message).await;
        match self.database.touch_last_online(&login, unix_now()).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => warn!(%login, "failed to record last online time: {e}"),
        }
    }
}

/// Drain a session's outbound queue onto the socket
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Vec<u8>>,
    peer: SocketAddr,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!(%peer, "write failed, dropping session output: {e}");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
