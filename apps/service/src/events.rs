use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::database::models::{Access, Host, HostState};

/// Capacity of the in-process fan-out channel
const CHANNEL_CAPACITY: usize = 1024;

/// Something every connected client should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Alarm { message: String },
    /// Result of one probe; `state` is true when the host answered
    Icmp { ip: String, name: String, state: bool },
    User { login: String, access: Access, ip: String, message: String },
}

/// Event sink: broadcast to sessions plus an append-only text file.
///
/// None of the emit methods fail; write errors on the file are logged and
/// the entry is dropped from the file only.
pub struct EventLog {
    tx: broadcast::Sender<Event>,
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl EventLog {
    /// Open (or create) the durable log at `path`; `None` keeps events in memory only
    pub async fn open(path: Option<PathBuf>) -> Result<Self> {
        let file = match &path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("creating log directory {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .with_context(|| format!("opening event log {}", path.display()))?;
                Some(file)
            }
            None => None,
        };

        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self { tx, path, file: Mutex::new(file) })
    }

    /// Log without a durable file
    pub fn in_memory() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, path: None, file: Mutex::new(None) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub async fn alarm(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "hostwatch::alarm", "{message}");
        self.append(&message).await;
        self.publish(Event::Alarm { message });
    }

    pub async fn icmp_good(&self, host: &Host) {
        debug!(ip = %host.ip, name = %host.name, "host answered");
        self.publish(Event::Icmp { ip: host.ip.clone(), name: host.name.clone(), state: true });
    }

    pub async fn icmp_bad(&self, host: &Host) {
        debug!(ip = %host.ip, name = %host.name, "host did not answer");
        self.publish(Event::Icmp { ip: host.ip.clone(), name: host.name.clone(), state: false });
    }

    pub async fn user_event(
        &self,
        login: &str,
        access: Access,
        ip: &str,
        message: impl Into<String>,
    ) {
        let message = message.into();
        info!(login, %access, ip, "{message}");
        self.append(&format!("{login} ({access}) {ip}: {message}")).await;
        self.publish(Event::User { login: login.to_string(), access, ip: ip.to_string(), message });
    }

    /// Record a stable state transition of a host
    pub async fn state_change(&self, host: &Host, from: HostState, to: HostState) {
        info!(ip = %host.ip, name = %host.name, %from, %to, "host state changed");
        self.append(&format!("{} ({}) {} -> {}", host.name, host.ip, from, to)).await;
    }

    /// Last `lines` entries of the durable log.
    ///
    /// `None` when no file is configured or it has not been written yet.
    pub async fn tail(&self, lines: usize) -> Result<Option<Vec<String>>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        // Keep a concurrent append from landing half-way through the read.
        let _guard = self.file.lock().await;
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading event log {}", path.display()));
            }
        };

        let all: Vec<&str> = contents.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(Some(all[start..].iter().map(|line| line.to_string()).collect()))
    }

    fn publish(&self, event: Event) {
        // No receivers is the normal state before the first client connects.
        let _ = self.tx.send(event);
    }

    async fn append(&self, message: &str) {
        let mut file = self.file.lock().await;
        let Some(file) = file.as_mut() else {
            return;
        };

        let stamp = chrono::Local::now().format("%Y/%m/%d  %H:%M:%S");
        let line = format!("[{stamp}]  {message}\n");
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!("failed to append to event log: {e}");
            return;
        }
        if let Err(e) = file.flush().await {
            warn!("failed to flush event log: {e}");
        }
    }
}
