use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::notifier::Notifier;
use super::prober::Prober;
use crate::database::models::{Host, HostState, PingerConfig, unix_now};
use crate::database::{Database, HostUpdate, StoreResult};
use crate::events::EventLog;

/// Pause between the advisory alarm and the start of a scheduled sweep
pub const SWEEP_GRACE: Duration = Duration::from_secs(10);

/// Delay before an offline host with `double_check` is probed again
pub const DOUBLE_CHECK_DELAY: Duration = Duration::from_secs(30);
const DOUBLE_CHECK_COUNT: u32 = 5;
const DOUBLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const DOUBLE_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Which hosts a sweep visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Periodic run: announced, then delayed by [`SWEEP_GRACE`]
    Scheduled,
    /// Every host that is not paused
    All,
    /// Only hosts currently `offline` or `clock.offline`
    Dead,
}

impl Sweep {
    fn includes(self, host: &Host) -> bool {
        match self {
            Sweep::Scheduled | Sweep::All => host.state != HostState::Pause,
            Sweep::Dead => host.state.is_down(),
        }
    }
}

/// Drives host state from ICMP reachability
pub struct Pinger {
    database: Arc<dyn Database>,
    events: Arc<EventLog>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    config: RwLock<PingerConfig>,
}

impl Pinger {
    pub fn new(
        database: Arc<dyn Database>,
        events: Arc<EventLog>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
        config: PingerConfig,
    ) -> Arc<Self> {
        Arc::new(Self { database, events, prober, notifier, config: RwLock::new(config) })
    }

    pub async fn config(&self) -> PingerConfig {
        self.config.read().await.clone()
    }

    /// Change the parameters, persist them, then make them live.
    ///
    /// The write lock is held across the save so concurrent updates cannot
    /// lose each other. Running sleeps finish with the old values.
    pub async fn update_config(
        &self,
        change: impl FnOnce(&mut PingerConfig),
    ) -> StoreResult<PingerConfig> {
        let mut live = self.config.write().await;
        let mut config = live.clone();
        change(&mut config);

        self.database.save_pinger_config(&config).await?;
        info!(?config, "pinger configuration updated");
        *live = config.clone();
        Ok(config)
    }

    /// Start the perpetual loop: one scheduled sweep every `auto_ping_interval_s`
    pub fn run(self: &Arc<Self>) -> JoinHandle<()> {
        let pinger = self.clone();
        tokio::spawn(async move {
            loop {
                let sweeper = pinger.clone();
                tokio::spawn(async move {
                    sweeper.sweep(Sweep::Scheduled).await;
                });

                let interval = pinger.config().await.auto_ping_interval();
                sleep(interval).await;
            }
        })
    }

    pub fn ping_all(self: &Arc<Self>) -> JoinHandle<()> {
        let pinger = self.clone();
        tokio::spawn(async move {
            pinger.sweep(Sweep::All).await;
        })
    }

    pub fn ping_dead(self: &Arc<Self>) -> JoinHandle<()> {
        let pinger = self.clone();
        tokio::spawn(async move {
            pinger.sweep(Sweep::Dead).await;
        })
    }

    pub fn ping_one(self: &Arc<Self>, ip: impl Into<String>) -> JoinHandle<()> {
        let pinger = self.clone();
        let ip = ip.into();
        tokio::spawn(async move {
            pinger.probe_host(&ip).await;
        })
    }

    /// Dispatch one probe task per matching host, rate limited by
    /// `hosts_per_second`. Returns the handles of the dispatched probes.
    pub async fn sweep(self: &Arc<Self>, kind: Sweep) -> Vec<JoinHandle<()>> {
        if kind == Sweep::Scheduled {
            let grace = SWEEP_GRACE.as_secs();
            self.events
                .alarm(format!("Scheduled check of all hosts starts in {grace} seconds"))
                .await;
            sleep(SWEEP_GRACE).await;
        }

        let hosts = match self.database.list_hosts().await {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(?kind, "sweep aborted, could not list hosts: {e}");
                return Vec::new();
            }
        };

        let mut handles = Vec::new();
        for host in hosts.into_iter().filter(|host| kind.includes(host)) {
            if !handles.is_empty() {
                let spacing = self.config().await.dispatch_spacing();
                sleep(spacing).await;
            }

            let pinger = self.clone();
            handles.push(tokio::spawn(async move {
                pinger.probe_current(&host.ip, Some(kind)).await
            }));
        }

        debug!(?kind, dispatched = handles.len(), "sweep dispatched");
        handles
    }

    /// Probe one host on request, paused or not, and settle its state
    pub async fn probe_host(&self, ip: &str) {
        self.probe_current(ip, None).await;
    }

    /// Probe the host as currently stored.
    ///
    /// Sweeps list hosts well before reaching them, so the row is read again
    /// here: a host that left the sweep's selection meanwhile (paused, or no
    /// longer down for ping-dead) is skipped, and transitions are judged
    /// against the latest stable state.
    ///
    /// A fault aborts only this host: its pre-probe state is put back and a
    /// reachability-bad event is emitted.
    async fn probe_current(&self, ip: &str, sweep: Option<Sweep>) {
        let host = match self.database.get_host(ip).await {
            Ok(Some(host)) => host,
            Ok(None) => {
                debug!(%ip, "host removed before it could be probed");
                return;
            }
            Err(e) => {
                warn!(%ip, "failed to load host for probing: {e}");
                return;
            }
        };
        if let Some(kind) = sweep.filter(|kind| !kind.includes(&host)) {
            debug!(%ip, state = %host.state, ?kind, "host left the sweep before its turn");
            return;
        }

        let prior = host.state;
        if let Err(e) = self.try_probe(&host).await {
            warn!(ip = %host.ip, "probe aborted: {e:#}");
            if prior != HostState::Pause {
                let restore = HostUpdate::State(prior.settled());
                if let Err(e) = self.database.update_host(&host.ip, restore).await {
                    warn!(ip = %host.ip, "failed to restore host state: {e}");
                }
            }
            self.events.icmp_bad(&host).await;
        }
    }

    async fn try_probe(&self, host: &Host) -> Result<()> {
        let prior = host.state;
        let paused = prior == HostState::Pause;

        if !paused {
            self.database.update_host(&host.ip, HostUpdate::State(prior.probing())).await?;
        }

        let config = self.config().await;
        let outcome = self
            .prober
            .probe(&host.ip, config.icmp_count, config.icmp_interval(), config.icmp_timeout())
            .await?;

        if outcome.reachable() {
            self.events.icmp_good(host).await;
            if paused {
                return Ok(());
            }

            if prior.is_down() {
                self.database.update_host(&host.ip, HostUpdate::LastChange(unix_now())).await?;
                self.events.state_change(host, HostState::Offline, HostState::Online).await;

                if let Some(sms) = host.sms_config.as_ref().filter(|sms| sms.online) {
                    self.spawn_notification(&host.ip, sms.online_url.clone(), "online");
                }
            }
            self.database.update_host(&host.ip, HostUpdate::State(HostState::Online)).await?;
        } else {
            self.events.icmp_bad(host).await;
            if paused {
                return Ok(());
            }

            if prior.is_up() {
                self.database.update_host(&host.ip, HostUpdate::LastChange(unix_now())).await?;
                self.events.state_change(host, HostState::Online, HostState::Offline).await;

                if let Some(sms) = host.sms_config.as_ref().filter(|sms| sms.offline) {
                    if sms.double_check {
                        self.spawn_double_check(&host.ip, sms.offline_url.clone());
                    } else {
                        self.spawn_notification(&host.ip, sms.offline_url.clone(), "offline");
                    }
                }
            }
            self.database.update_host(&host.ip, HostUpdate::State(HostState::Offline)).await?;
        }

        Ok(())
    }

    fn spawn_notification(&self, ip: &str, url: String, direction: &'static str) {
        let notifier = self.notifier.clone();
        let events = self.events.clone();
        let ip = ip.to_string();
        tokio::spawn(async move {
            deliver(notifier.as_ref(), &events, &ip, &url, direction).await;
        });
    }

    fn spawn_double_check(&self, ip: &str, url: String) {
        let prober = self.prober.clone();
        let notifier = self.notifier.clone();
        let events = self.events.clone();
        let ip = ip.to_string();
        tokio::spawn(async move {
            sleep(DOUBLE_CHECK_DELAY).await;

            let still_down = match prober
                .probe(&ip, DOUBLE_CHECK_COUNT, DOUBLE_CHECK_INTERVAL, DOUBLE_CHECK_TIMEOUT)
                .await
            {
                Ok(outcome) => !outcome.reachable(),
                Err(e) => {
                    warn!(%ip, "double check probe failed: {e:#}");
                    true
                }
            };

            if still_down {
                deliver(notifier.as_ref(), &events, &ip, &url, "offline").await;
            } else {
                info!(%ip, "host answered the double check, offline notification dropped");
            }
        });
    }
}

async fn deliver(notifier: &dyn Notifier, events: &EventLog, ip: &str, url: &str, direction: &str) {
    match notifier.notify(url).await {
        Ok(()) => {
            events
                .alarm(format!("SMS notification about host <{ip}> going {direction} sent"))
                .await
        }
        Err(e) => {
            warn!(%ip, url, "SMS notification failed: {e:#}");
            events
                .alarm(format!("SMS notification about host <{ip}> going {direction} failed: {e}"))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::SmsConfig;
    use crate::database::testing::create_test_database;
    use crate::events::Event;
    use crate::monitoring::testing::{RecordingNotifier, ScriptedProber};
    use tokio::time::Instant;

    struct Fixture {
        pinger: Arc<Pinger>,
        database: Arc<crate::database::DatabaseImpl>,
        prober: Arc<ScriptedProber>,
        notifier: Arc<RecordingNotifier>,
        events: Arc<EventLog>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(config: PingerConfig) -> Fixture {
        let (database, dir) = create_test_database().await.unwrap();
        let prober = Arc::new(ScriptedProber::new(false));
        let notifier = Arc::new(RecordingNotifier::default());
        let events = Arc::new(EventLog::in_memory());
        let pinger =
            Pinger::new(database.clone(), events.clone(), prober.clone(), notifier.clone(), config);
        Fixture { pinger, database, prober, notifier, events, _dir: dir }
    }

    /// Let spawned notification tasks run to completion
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn state_of(fixture: &Fixture, ip: &str) -> HostState {
        fixture.database.get_host(ip).await.unwrap().unwrap().state
    }

    #[tokio::test]
    async fn test_recovery_sets_online_and_notifies() {
        let f = fixture(PingerConfig::default()).await;
        let sms = SmsConfig {
            online: true,
            online_url: "http://gw/up".into(),
            ..Default::default()
        };
        let mut host = Host::new("10.0.0.1", "gw", 1).with_sms(sms);
        host.last_change_time = 0;
        f.database.insert_host(&host).await.unwrap();
        f.prober.reply("10.0.0.1", Ok(true));
        let mut rx = f.events.subscribe();

        f.pinger.probe_host("10.0.0.1").await;
        settle().await;

        let stored = f.database.get_host("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(stored.state, HostState::Online);
        assert!(stored.last_change_time > 0);
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Icmp { ip: "10.0.0.1".into(), name: "gw".into(), state: true },
        );
        assert_eq!(f.notifier.urls(), ["http://gw/up"]);
    }

    #[tokio::test]
    async fn test_steady_state_does_not_touch_change_time() {
        let f = fixture(PingerConfig::default()).await;
        let mut host = Host::new("10.0.0.1", "gw", 1).with_state(HostState::Online);
        host.last_change_time = 7;
        f.database.insert_host(&host).await.unwrap();
        f.prober.reply("10.0.0.1", Ok(true));

        f.pinger.probe_host("10.0.0.1").await;

        let stored = f.database.get_host("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(stored.state, HostState::Online);
        assert_eq!(stored.last_change_time, 7);
    }

    #[tokio::test]
    async fn test_outage_notifies_immediately_without_double_check() {
        let f = fixture(PingerConfig::default()).await;
        let sms = SmsConfig {
            offline: true,
            offline_url: "http://gw/down".into(),
            ..Default::default()
        };
        let host = Host::new("10.0.0.1", "gw", 1).with_state(HostState::Online).with_sms(sms);
        f.database.insert_host(&host).await.unwrap();

        f.pinger.probe_host("10.0.0.1").await;
        settle().await;
        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Offline);
        assert_eq!(f.notifier.urls(), ["http://gw/down"]);

        // Still down on the next sweep: no second notification.
        f.pinger.probe_host("10.0.0.1").await;
        settle().await;
        assert_eq!(f.notifier.urls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_check_suppresses_when_host_returns() {
        let f = fixture(PingerConfig::default()).await;
        let sms = SmsConfig {
            offline: true,
            offline_url: "http://gw/down".into(),
            double_check: true,
            ..Default::default()
        };
        let host = Host::new("10.0.0.1", "gw", 1).with_state(HostState::Online).with_sms(sms);
        f.database.insert_host(&host).await.unwrap();
        f.prober.reply("10.0.0.1", Ok(false));
        f.prober.reply("10.0.0.1", Ok(true));

        f.pinger.probe_host("10.0.0.1").await;
        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Offline);

        sleep(DOUBLE_CHECK_DELAY + Duration::from_secs(1)).await;
        assert!(f.notifier.urls().is_empty());

        let calls = f.prober.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].count, 5);
        assert!(calls[1].at - calls[0].at >= DOUBLE_CHECK_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_check_notifies_once_when_still_down() {
        let f = fixture(PingerConfig::default()).await;
        let sms = SmsConfig {
            offline: true,
            offline_url: "http://gw/down".into(),
            double_check: true,
            ..Default::default()
        };
        let host = Host::new("10.0.0.1", "gw", 1).with_state(HostState::Online).with_sms(sms);
        f.database.insert_host(&host).await.unwrap();

        f.pinger.probe_host("10.0.0.1").await;
        sleep(DOUBLE_CHECK_DELAY - Duration::from_secs(1)).await;
        assert!(f.notifier.urls().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(f.notifier.urls(), ["http://gw/down"]);
    }

    #[tokio::test]
    async fn test_failed_notification_raises_alarm() {
        let f = fixture(PingerConfig::default()).await;
        f.notifier.fail();
        let sms = SmsConfig {
            online: true,
            online_url: "http://gw/up".into(),
            ..Default::default()
        };
        let host = Host::new("10.0.0.1", "gw", 1).with_sms(sms);
        f.database.insert_host(&host).await.unwrap();
        f.prober.reply("10.0.0.1", Ok(true));
        let mut rx = f.events.subscribe();

        f.pinger.probe_host("10.0.0.1").await;
        let _icmp = rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            Event::Alarm { message } => assert!(message.contains("failed")),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Online);
    }

    #[tokio::test]
    async fn test_probe_fault_restores_prior_state() {
        let f = fixture(PingerConfig::default()).await;
        let host = Host::new("10.0.0.1", "gw", 1).with_state(HostState::Online);
        f.database.insert_host(&host).await.unwrap();
        f.prober.reply("10.0.0.1", Err("socket closed".into()));
        let mut rx = f.events.subscribe();

        f.pinger.probe_host("10.0.0.1").await;

        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Online);
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Icmp { ip: "10.0.0.1".into(), name: "gw".into(), state: false },
        );
    }

    #[tokio::test]
    async fn test_ping_one_on_paused_host_keeps_state() {
        let f = fixture(PingerConfig::default()).await;
        f.database
            .insert_host(&Host::new("10.0.0.1", "gw", 1).with_state(HostState::Pause))
            .await
            .unwrap();
        f.prober.reply("10.0.0.1", Ok(true));
        let mut rx = f.events.subscribe();

        f.pinger.ping_one("10.0.0.1").await.unwrap();

        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Pause);
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Icmp { ip: "10.0.0.1".into(), name: "gw".into(), state: true },
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_respects_hosts_per_second() {
        let f = fixture(PingerConfig { hosts_per_second: 4, ..PingerConfig::default() }).await;
        for i in 1..=5 {
            f.database.insert_host(&Host::new(format!("10.0.0.{i}"), "h", 1)).await.unwrap();
        }
        f.database
            .insert_host(&Host::new("10.0.0.99", "paused", 1).with_state(HostState::Pause))
            .await
            .unwrap();

        for handle in f.pinger.sweep(Sweep::All).await {
            handle.await.unwrap();
        }

        let calls = f.prober.calls();
        let ips: Vec<_> = calls.iter().map(|c| c.ip.as_str()).collect();
        assert_eq!(ips, ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]);
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_sweep_waits_for_grace_period() {
        let f = fixture(PingerConfig::default()).await;
        f.database.insert_host(&Host::new("10.0.0.1", "gw", 1)).await.unwrap();
        let mut rx = f.events.subscribe();

        let started = Instant::now();
        for handle in f.pinger.sweep(Sweep::Scheduled).await {
            handle.await.unwrap();
        }

        assert!(matches!(rx.recv().await.unwrap(), Event::Alarm { .. }));
        assert!(f.prober.calls()[0].at - started >= SWEEP_GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_dead_only_visits_down_hosts() {
        let f = fixture(PingerConfig::default()).await;
        f.database
            .insert_host(&Host::new("10.0.0.1", "a", 1).with_state(HostState::Online))
            .await
            .unwrap();
        f.database.insert_host(&Host::new("10.0.0.2", "b", 1)).await.unwrap();
        f.database
            .insert_host(&Host::new("10.0.0.3", "c", 1).with_state(HostState::ClockOffline))
            .await
            .unwrap();
        f.database
            .insert_host(&Host::new("10.0.0.4", "d", 1).with_state(HostState::Pause))
            .await
            .unwrap();

        for handle in f.pinger.sweep(Sweep::Dead).await {
            handle.await.unwrap();
        }

        let ips: Vec<_> = f.prober.calls().into_iter().map(|c| c.ip).collect();
        assert_eq!(ips, ["10.0.0.2", "10.0.0.3"]);
    }

    #[tokio::test]
    async fn test_applied_config_reaches_next_probe() {
        let f = fixture(PingerConfig::default()).await;
        let host = Host::new("10.0.0.1", "gw", 1);
        f.database.insert_host(&host).await.unwrap();

        f.pinger.update_config(|config| config.icmp_count = 7).await.unwrap();
        f.pinger.probe_host("10.0.0.1").await;

        assert_eq!(f.prober.calls()[0].count, 7);
        assert_eq!(f.pinger.config().await.icmp_count, 7);
        assert_eq!(f.database.pinger_config().await.unwrap().icmp_count, 7);
    }

    /// Run a sweep in the background and hand back its dispatch handles
    fn spawn_sweep(f: &Fixture, kind: Sweep) -> JoinHandle<Vec<JoinHandle<()>>> {
        let pinger = f.pinger.clone();
        tokio::spawn(async move { pinger.sweep(kind).await })
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_paused_mid_sweep_is_skipped() {
        let f = fixture(PingerConfig { hosts_per_second: 1, ..PingerConfig::default() }).await;
        f.database
            .insert_host(&Host::new("10.0.0.1", "a", 1).with_state(HostState::Online))
            .await
            .unwrap();
        f.database
            .insert_host(&Host::new("10.0.0.2", "b", 1).with_state(HostState::Online))
            .await
            .unwrap();

        let sweep = spawn_sweep(&f, Sweep::All);
        sleep(Duration::from_millis(300)).await;
        f.database.update_host("10.0.0.2", HostUpdate::State(HostState::Pause)).await.unwrap();

        for handle in sweep.await.unwrap() {
            handle.await.unwrap();
        }

        let ips: Vec<_> = f.prober.calls().into_iter().map(|c| c.ip).collect();
        assert_eq!(ips, ["10.0.0.1"]);
        assert_eq!(state_of(&f, "10.0.0.2").await, HostState::Pause);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_after_ping_one_does_not_repeat_offline_notification() {
        let f = fixture(PingerConfig { hosts_per_second: 1, ..PingerConfig::default() }).await;
        let sms = SmsConfig {
            offline: true,
            offline_url: "http://gw/down".into(),
            ..Default::default()
        };
        f.database
            .insert_host(&Host::new("10.0.0.1", "a", 1).with_state(HostState::Online))
            .await
            .unwrap();
        let b = Host::new("10.0.0.2", "b", 1).with_state(HostState::Online).with_sms(sms);
        f.database.insert_host(&b).await.unwrap();

        let sweep = spawn_sweep(&f, Sweep::All);
        sleep(Duration::from_millis(300)).await;
        f.pinger.ping_one("10.0.0.2").await.unwrap();
        settle().await;
        assert_eq!(f.notifier.urls(), ["http://gw/down"]);
        let changed = f.database.get_host("10.0.0.2").await.unwrap().unwrap().last_change_time;

        for handle in sweep.await.unwrap() {
            handle.await.unwrap();
        }
        settle().await;

        // The sweep still probed b, but saw it already offline.
        let ips: Vec<_> = f.prober.calls().into_iter().map(|c| c.ip).collect();
        assert_eq!(ips, ["10.0.0.1", "10.0.0.2", "10.0.0.2"]);
        assert_eq!(f.notifier.urls(), ["http://gw/down"]);
        assert_eq!(state_of(&f, "10.0.0.2").await, HostState::Offline);
        assert_eq!(
            f.database.get_host("10.0.0.2").await.unwrap().unwrap().last_change_time,
            changed,
        );
    }

    #[tokio::test]
    async fn test_ping_fault_never_leaves_clock_state() {
        let f = fixture(PingerConfig::default()).await;
        f.database
            .insert_host(&Host::new("10.0.0.1", "gw", 1).with_state(HostState::ClockOnline))
            .await
            .unwrap();
        f.prober.reply("10.0.0.1", Err("socket closed".into()));

        f.pinger.probe_host("10.0.0.1").await;

        assert_eq!(state_of(&f, "10.0.0.1").await, HostState::Online);
    }

    #[tokio::test]
    async fn test_concurrent_config_updates_keep_both_changes() {
        let f = fixture(PingerConfig::default()).await;

        let (first, second) = tokio::join!(
            f.pinger.update_config(|config| config.icmp_count = 9),
            f.pinger.update_config(|config| config.hosts_per_second = 3),
        );
        first.unwrap();
        second.unwrap();

        let live = f.pinger.config().await;
        assert_eq!((live.icmp_count, live.hosts_per_second), (9, 3));
        assert_eq!(f.database.pinger_config().await.unwrap(), live);
    }
}
