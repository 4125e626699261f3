//! In-process stand-ins for the ICMP prober and the SMS gateway

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;

use super::notifier::Notifier;
use super::prober::{ProbeOutcome, Prober};

#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub ip: String,
    pub count: u32,
    pub at: Instant,
}

/// Answers probes from a per-address queue, falling back to a fixed reply
pub struct ScriptedProber {
    fallback: bool,
    replies: Mutex<HashMap<String, VecDeque<Result<bool, String>>>>,
    calls: Mutex<Vec<ProbeCall>>,
}

impl ScriptedProber {
    pub fn new(fallback: bool) -> Self {
        Self { fallback, replies: Mutex::default(), calls: Mutex::default() }
    }

    /// Queue the next answer for `ip`; `Err` makes the probe itself fail
    pub fn reply(&self, ip: &str, reply: Result<bool, String>) {
        self.replies.lock().unwrap().entry(ip.to_string()).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(
        &self,
        address: &str,
        count: u32,
        _interval: Duration,
        _timeout: Duration,
    ) -> Result<ProbeOutcome> {
        let call = ProbeCall { ip: address.to_string(), count, at: Instant::now() };
        self.calls.lock().unwrap().push(call);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(self.fallback));

        match reply {
            Ok(true) => Ok(ProbeOutcome { sent: count, received: count }),
            Ok(false) => Ok(ProbeOutcome { sent: count, received: 0 }),
            Err(e) => Err(anyhow!(e)),
        }
    }
}

/// Records every trigger URL it is asked to call
#[derive(Default)]
pub struct RecordingNotifier {
    urls: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Make every later delivery fail (after recording it)
    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        if *self.failing.lock().unwrap() { Err(anyhow!("gateway down")) } else { Ok(()) }
    }
}
