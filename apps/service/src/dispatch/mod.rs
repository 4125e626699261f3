//! Turns decoded request envelopes into storage calls and responses.

mod error;
mod items;
mod mutate;
mod query;
mod service;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hostwatch_proto::{Request, Response};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::database::Database;
use crate::database::models::Access;
use crate::events::EventLog;
use crate::monitoring::Pinger;
use crate::server::sessions::SessionRegistry;

pub use error::{CommandError, CommandResult};

/// Who sent the request being handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub login: String,
    pub access: Access,
    pub peer: SocketAddr,
}

pub struct Dispatcher {
    database: Arc<dyn Database>,
    events: Arc<EventLog>,
    pinger: Arc<Pinger>,
    sessions: Arc<SessionRegistry>,
    shutdown: Arc<Notify>,
    started: Instant,
}

/// SERVICE commands open to every access level
const GUEST_COMMANDS: [i64; 4] = [10, 20, 21, 82];

impl Dispatcher {
    pub fn new(
        database: Arc<dyn Database>,
        events: Arc<EventLog>,
        pinger: Arc<Pinger>,
        sessions: Arc<SessionRegistry>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self { database, events, pinger, sessions, shutdown, started: Instant::now() }
    }

    /// Handle one decoded frame. Never fails: every fault becomes a response.
    pub async fn handle(&self, raw: &[u8], caller: &Caller) -> Response {
        let request: Request = match serde_json::from_slice(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!(login = %caller.login, "undecodable request: {e}");
                return Response::bad_request();
            }
        };

        match self.execute(request, caller).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn execute(&self, request: Request, caller: &Caller) -> CommandResult {
        if requires_admin(&request) && !caller.access.is_admin() {
            self.audit(caller, format!("refused {}: no permissions", describe(&request))).await;
            return Err(CommandError::PermissionDenied);
        }

        match request {
            Request::Get { object, item } => self.get(object, item).await,
            Request::Post { object, item } => self.post(object, item, caller).await,
            Request::Put { object, item } => self.put(object, item, caller).await,
            Request::Delete { object, item } => self.delete(object, item, caller).await,
            Request::Service { command, item } => self.service(command, item, caller).await,
        }
    }

    async fn audit(&self, caller: &Caller, message: impl Into<String>) {
        let peer = caller.peer.to_string();
        self.events.user_event(&caller.login, caller.access, &peer, message).await;
    }

    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

fn requires_admin(request: &Request) -> bool {
    match request {
        Request::Get { .. } => false,
        Request::Service { command, .. } => !GUEST_COMMANDS.contains(command),
        Request::Post { .. } | Request::Put { .. } | Request::Delete { .. } => true,
    }
}

fn describe(request: &Request) -> String {
    match request {
        Request::Get { object, .. }
        | Request::Post { object, .. }
        | Request::Put { object, .. }
        | Request::Delete { object, .. } => format!("{} {}", request.verb(), object),
        Request::Service { command, .. } => format!("SERVICE {command}"),
    }
}

/// 200 with `data` serialized
fn success(data: impl Serialize) -> CommandResult {
    serde_json::to_value(data)
        .map(Response::success)
        .map_err(|e| {
            tracing::error!("failed to serialize response: {e}");
            CommandError::StorageFailure("DB.error".into())
        })
}

/// `H:MM:SS`, prefixed with `N day(s), ` past the first day
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
