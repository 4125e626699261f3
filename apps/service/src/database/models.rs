use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Reachability state of a host.
///
/// The `clock.*` variants mark a host whose probe is in flight; they always
/// resolve back to `online` or `offline` when the probe finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostState {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "clock.online")]
    ClockOnline,
    #[serde(rename = "clock.offline")]
    ClockOffline,
}

impl HostState {
    pub const fn as_str(self) -> &'static str {
        match self {
            HostState::Online => "online",
            HostState::Offline => "offline",
            HostState::Pause => "pause",
            HostState::ClockOnline => "clock.online",
            HostState::ClockOffline => "clock.offline",
        }
    }

    /// `online` or `clock.online`
    pub fn is_up(self) -> bool {
        matches!(self, HostState::Online | HostState::ClockOnline)
    }

    /// `offline` or `clock.offline`
    pub fn is_down(self) -> bool {
        matches!(self, HostState::Offline | HostState::ClockOffline)
    }

    /// State to show while a probe re-verifies this host
    pub fn probing(self) -> Self {
        match self {
            HostState::Online | HostState::ClockOnline => HostState::ClockOnline,
            HostState::Offline | HostState::ClockOffline => HostState::ClockOffline,
            HostState::Pause => HostState::Pause,
        }
    }

    /// Drop the in-flight marker
    pub fn settled(self) -> Self {
        match self {
            HostState::ClockOnline => HostState::Online,
            HostState::ClockOffline => HostState::Offline,
            other => other,
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown host state `{0}`")]
pub struct UnknownHostState(pub String);

impl FromStr for HostState {
    type Err = UnknownHostState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(HostState::Online),
            "offline" => Ok(HostState::Offline),
            "pause" => Ok(HostState::Pause),
            "clock.online" => Ok(HostState::ClockOnline),
            "clock.offline" => Ok(HostState::ClockOffline),
            other => Err(UnknownHostState(other.to_string())),
        }
    }
}

/// SMS triggers attached to a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Notify when the host comes back
    pub online: bool,
    pub online_url: String,
    /// Notify when the host goes away
    pub offline: bool,
    pub offline_url: String,
    /// Re-probe once more before sending the offline notification
    pub double_check: bool,
}

/// A monitored endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub ip: String,
    pub name: String,
    pub folder_id: i64,
    pub state: HostState,
    pub last_change_time: i64,
    pub info: String,
    #[serde(rename = "sms")]
    pub sms_config: Option<SmsConfig>,
}

impl Host {
    pub fn new(ip: impl Into<String>, name: impl Into<String>, folder_id: i64) -> Self {
        Self {
            ip: ip.into(),
            name: name.into(),
            folder_id,
            state: HostState::Offline,
            last_change_time: unix_now(),
            info: String::new(),
            sms_config: None,
        }
    }

    pub fn with_state(mut self, state: HostState) -> Self {
        self.state = state;
        self
    }

    pub fn with_sms(mut self, sms: SmsConfig) -> Self {
        self.sms_config = Some(sms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Guest,
    Admin,
}

impl Access {
    pub const fn as_str(self) -> &'static str {
        match self {
            Access::Guest => "guest",
            Access::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Access::Admin
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Access::Guest),
            "admin" => Ok(Access::Admin),
            other => Err(format!("unknown access level `{other}`")),
        }
    }
}

/// Registered client account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub password: String,
    pub access: Access,
    pub last_online: Option<i64>,
}

/// A user as shown to clients (no secret)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub login: String,
    pub access: Access,
    pub last_online: Option<i64>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self { login: user.login.clone(), access: user.access, last_online: user.last_online }
    }
}

/// SMS recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: String,
    #[serde(default)]
    pub info: String,
}

/// Probe scheduling parameters, persisted as a single row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingerConfig {
    pub auto_ping_interval_s: u64,
    pub icmp_count: u32,
    pub icmp_interval_s: f64,
    pub hosts_per_second: u32,
    pub icmp_timeout_s: f64,
}

impl Default for PingerConfig {
    fn default() -> Self {
        Self {
            auto_ping_interval_s: 300,
            icmp_count: 3,
            icmp_interval_s: 1.0,
            hosts_per_second: 10,
            icmp_timeout_s: 1.0,
        }
    }
}

impl PingerConfig {
    pub fn auto_ping_interval(&self) -> Duration {
        Duration::from_secs(self.auto_ping_interval_s.max(1))
    }

    /// Minimum gap between two probe dispatches within one sweep
    pub fn dispatch_spacing(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.hosts_per_second.max(1)))
    }

    pub fn icmp_interval(&self) -> Duration {
        seconds(self.icmp_interval_s)
    }

    pub fn icmp_timeout(&self) -> Duration {
        seconds(self.icmp_timeout_s)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::from_secs(1))
}
