use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};

/// Tally of one probe run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub sent: u32,
    pub received: u32,
}

impl ProbeOutcome {
    /// At least one echo came back
    pub fn reachable(&self) -> bool {
        self.received > 0
    }
}

/// Reachability probe for a single address
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Send `count` echoes spaced `interval` apart, each waiting at most `timeout`.
    ///
    /// Lost echoes are not errors; `Err` means the probe could not run at all.
    async fn probe(
        &self,
        address: &str,
        count: u32,
        interval: Duration,
        timeout: Duration,
    ) -> Result<ProbeOutcome>;
}

/// ICMP echo prober.
///
/// Needs raw-socket privileges (or an unprivileged ICMP socket allowed by
/// `net.ipv4.ping_group_range`).
pub struct IcmpProber {
    v4: Client,
    v6: Client,
}

const PAYLOAD: [u8; 56] = [0; 56];

impl IcmpProber {
    pub fn new() -> Result<Self> {
        let v4 = Client::new(&Config::default()).context("opening ICMPv4 socket")?;
        let v6_config = Config::builder().kind(ICMP::V6).build();
        let v6 = Client::new(&v6_config).context("opening ICMPv6 socket")?;
        Ok(Self { v4, v6 })
    }

    async fn resolve(address: &str) -> Result<IpAddr> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }

        tokio::net::lookup_host((address, 0))
            .await
            .with_context(|| format!("resolving {address}"))?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| anyhow!("{address} did not resolve to any address"))
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(
        &self,
        address: &str,
        count: u32,
        interval: Duration,
        timeout: Duration,
    ) -> Result<ProbeOutcome> {
        let ip = Self::resolve(address).await?;
        let client = if ip.is_ipv4() { &self.v4 } else { &self.v6 };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let mut outcome = ProbeOutcome::default();
        for seq in 0..count.max(1) {
            if seq > 0 {
                tokio::time::sleep(interval).await;
            }

            outcome.sent += 1;
            match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    outcome.received += 1;
                    tracing::trace!(%ip, seq, ?rtt, "echo reply");
                }
                Err(SurgeError::Timeout { .. }) => {
                    tracing::trace!(%ip, seq, "echo lost");
                }
                Err(e) => return Err(anyhow!("ICMP echo to {ip} failed: {e}")),
            }
        }

        Ok(outcome)
    }
}
