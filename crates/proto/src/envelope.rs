//! JSON documents carried inside frames.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::{FrameError, encode};

/// Status code carried in the `response` field of every server message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Unsolicited event pushed to every session
    Event,
    Success,
    NotFound,
    Malformed,
    StorageError,
    PermissionDenied,
    Conflict,
    AuthSuccess,
    AuthTimeout,
}

impl ResponseCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            ResponseCode::Event => 33,
            ResponseCode::Success => 200,
            ResponseCode::NotFound => 300,
            ResponseCode::Malformed => 400,
            ResponseCode::StorageError => 500,
            ResponseCode::PermissionDenied => 600,
            ResponseCode::Conflict => 700,
            ResponseCode::AuthSuccess => 800,
            ResponseCode::AuthTimeout => 900,
        }
    }

    pub const fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            33 => ResponseCode::Event,
            200 => ResponseCode::Success,
            300 => ResponseCode::NotFound,
            400 => ResponseCode::Malformed,
            500 => ResponseCode::StorageError,
            600 => ResponseCode::PermissionDenied,
            700 => ResponseCode::Conflict,
            800 => ResponseCode::AuthSuccess,
            900 => ResponseCode::AuthTimeout,
            _ => return None,
        })
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for ResponseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        ResponseCode::from_u16(code)
            .ok_or_else(|| de::Error::custom(format!("unknown response code {code}")))
    }
}

/// `{"response": <code>, "data": <payload>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub response: ResponseCode,
    #[serde(default)]
    pub data: Value,
}

impl Response {
    pub fn new(code: ResponseCode, data: impl Into<Value>) -> Self {
        Self { response: code, data: data.into() }
    }

    pub fn success(data: impl Into<Value>) -> Self {
        Self::new(ResponseCode::Success, data)
    }

    pub fn auth_success() -> Self {
        Self::new(ResponseCode::AuthSuccess, "auth success")
    }

    pub fn auth_failed() -> Self {
        Self::new(ResponseCode::Malformed, "auth error")
    }

    pub fn auth_timeout() -> Self {
        Self::new(ResponseCode::AuthTimeout, "auth timeout")
    }

    pub fn bad_request() -> Self {
        Self::new(ResponseCode::Malformed, "bad request")
    }

    pub fn no_permissions() -> Self {
        Self::new(ResponseCode::PermissionDenied, "no permissions")
    }

    /// Wrap an event payload for broadcast
    pub fn event(data: impl Into<Value>) -> Self {
        Self::new(ResponseCode::Event, data)
    }

    pub fn is_success(&self) -> bool {
        self.response == ResponseCode::Success
    }

    /// Serialize and frame in one go.
    pub fn to_frame(&self) -> Result<Vec<u8>, FrameError> {
        encode(&serde_json::to_vec(self)?)
    }
}

/// First message of every connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self { login: login.into(), password: password.into() }
    }

    pub fn to_frame(&self) -> Result<Vec<u8>, FrameError> {
        encode(&serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Service,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Service => "SERVICE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Host,
    Folder,
    User,
    Phone,
    Pinger,
    SmsApi,
    LogFile,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Host => "HOST",
            ObjectKind::Folder => "FOLDER",
            ObjectKind::User => "USER",
            ObjectKind::Phone => "PHONE",
            ObjectKind::Pinger => "PINGER",
            ObjectKind::SmsApi => "SMS_API",
            ObjectKind::LogFile => "LOG_FILE",
        };
        f.write_str(name)
    }
}

/// A post-handshake request envelope.
///
/// The `item` stays untyped here; its schema depends on the `(verb, object)`
/// pair and is checked by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "UPPERCASE")]
pub enum Request {
    Get {
        object: ObjectKind,
        #[serde(default)]
        item: Value,
    },
    Post {
        object: ObjectKind,
        #[serde(default)]
        item: Value,
    },
    Put {
        object: ObjectKind,
        #[serde(default)]
        item: Value,
    },
    Delete {
        object: ObjectKind,
        #[serde(default)]
        item: Value,
    },
    Service {
        command: i64,
        #[serde(default)]
        item: Value,
    },
}

impl Request {
    pub fn get(object: ObjectKind, item: impl Into<Value>) -> Self {
        Request::Get { object, item: item.into() }
    }

    pub fn post(object: ObjectKind, item: impl Into<Value>) -> Self {
        Request::Post { object, item: item.into() }
    }

    pub fn put(object: ObjectKind, item: impl Into<Value>) -> Self {
        Request::Put { object, item: item.into() }
    }

    pub fn delete(object: ObjectKind, item: impl Into<Value>) -> Self {
        Request::Delete { object, item: item.into() }
    }

    pub fn service(command: i64, item: impl Into<Value>) -> Self {
        Request::Service { command, item: item.into() }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Request::Get { .. } => Verb::Get,
            Request::Post { .. } => Verb::Post,
            Request::Put { .. } => Verb::Put,
            Request::Delete { .. } => Verb::Delete,
            Request::Service { .. } => Verb::Service,
        }
    }

    pub fn item(&self) -> &Value {
        match self {
            Request::Get { item, .. }
            | Request::Post { item, .. }
            | Request::Put { item, .. }
            | Request::Delete { item, .. }
            | Request::Service { item, .. } => item,
        }
    }

    pub fn to_frame(&self) -> Result<Vec<u8>, FrameError> {
        encode(&serde_json::to_vec(self)?)
    }
}
