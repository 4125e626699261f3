//! Typed `item` payloads, one per `(verb, object)` pair.

use std::net::{IpAddr, SocketAddr};

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::error::CommandError;
use crate::database::models::{Access, HostState, SmsConfig};

/// Decode an item, reporting any mismatch as a malformed request
pub fn parse<T: DeserializeOwned>(item: Value) -> Result<T, CommandError> {
    serde_json::from_value(item).map_err(|e| {
        tracing::debug!("item rejected: {e}");
        CommandError::Malformed
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostGroup {
    All,
    Dead,
    Live,
    Pause,
}

impl HostGroup {
    pub fn contains(self, state: HostState) -> bool {
        match self {
            HostGroup::All => true,
            HostGroup::Dead => state.is_down(),
            HostGroup::Live => state.is_up(),
            HostGroup::Pause => state == HostState::Pause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HostQuery {
    Group(HostGroup),
    One { ip: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllFolders {
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FolderQuery {
    All(AllFolders),
    One {
        #[serde(deserialize_with = "lenient_i64")]
        folder_id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserQuery {
    Online,
    Registered,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewHost {
    pub ip: String,
    pub name: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub folder_id: i64,
    #[serde(default)]
    pub state: Option<HostState>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default, deserialize_with = "sms_patch")]
    pub sms: Option<Option<SmsConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewFolder {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub login: String,
    #[serde(alias = "passw")]
    pub password: String,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPhone {
    pub number: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostChange {
    pub ip: String,
    pub new: HostFields,
}

/// Fields of a host edit; absent means unchanged
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostFields {
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub folder_id: Option<i64>,
    pub state: Option<HostState>,
    pub info: Option<String>,
    /// `Some(None)` clears the trigger
    #[serde(deserialize_with = "sms_patch")]
    pub sms: Option<Option<SmsConfig>>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderChange {
    #[serde(deserialize_with = "lenient_i64")]
    pub folder_id: i64,
    pub new: FolderFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FolderFields {
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub folder_id: Option<i64>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub move_hosts_to: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserChange {
    pub login: String,
    pub new: UserFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserFields {
    #[serde(alias = "passw")]
    pub password: Option<String>,
    pub access: Option<Access>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhoneChange {
    pub number: String,
    pub new: PhoneFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhoneFields {
    pub info: String,
}

/// Folder key given either as a number or as a numeric string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FolderKey(#[serde(deserialize_with = "lenient_i64")] pub i64);

/// `"ip:port"` or `["ip", port]`
pub fn peer_address(item: &Value) -> Option<SocketAddr> {
    match item {
        Value::String(text) => text.parse().ok(),
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(ip), port] => {
                let ip: IpAddr = ip.parse().ok()?;
                let port = port.as_u64().or_else(|| port.as_str()?.parse().ok())?;
                Some(SocketAddr::new(ip, u16::try_from(port).ok()?))
            }
            _ => None,
        },
        _ => None,
    }
}

/// A strictly positive number, given as JSON number or numeric string
pub fn positive_number(item: &Value) -> Option<f64> {
    let value = match item {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            number.as_i64().ok_or_else(|| de::Error::custom("expected an integer"))
        }
        Value::String(text) => text.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected an integer, got {other}"))),
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => lenient_i64(other).map(Some).map_err(de::Error::custom),
    }
}

fn sms_patch<'de, D>(deserializer: D) -> Result<Option<Option<SmsConfig>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Some(None)),
        Value::String(text) if text.is_empty() => Ok(Some(None)),
        other => {
            SmsConfig::deserialize(other).map(|sms| Some(Some(sms))).map_err(de::Error::custom)
        }
    }
}
