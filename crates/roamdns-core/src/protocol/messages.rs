//! Request/response envelope exchanged between reporter and server.
//!
//! Canonical encoding (string enums):
//!
//! ```text
//! {"cmd":"report-address","data":"alice"}
//! {"stat":"success","data":null}
//! ```
//!
//! The older integer-coded revision (`{"cmd":0,...}`) is not accepted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Error, Result};

const REPORT_ADDRESS: &str = "report-address";
const SUCCESS: &str = "success";
const FAILURE: &str = "failure";

/// Command carried by a [`Request`].
///
/// The enumeration is open: unknown command strings decode into
/// [`Command::Other`] so the server can log and drop them instead of
/// failing at the framing layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    /// Client reports its identity; the server observes the peer address.
    ReportAddress,
    /// Any command this build does not understand.
    Other(String),
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        match value.as_str() {
            REPORT_ADDRESS => Command::ReportAddress,
            _ => Command::Other(value),
        }
    }
}

impl From<Command> for String {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::ReportAddress => REPORT_ADDRESS.to_string(),
            Command::Other(s) => s,
        }
    }
}

/// Status carried by a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Success,
    Failure,
    Other(String),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Success => SUCCESS,
            Status::Failure => FAILURE,
            Status::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            SUCCESS => Status::Success,
            FAILURE => Status::Failure,
            _ => Status::Other(value),
        }
    }
}

impl From<Status> for String {
    fn from(stat: Status) -> Self {
        match stat {
            Status::Success => SUCCESS.to_string(),
            Status::Failure => FAILURE.to_string(),
            Status::Other(s) => s,
        }
    }
}

/// A single request. `data` is opaque JSON whose shape depends on `cmd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub cmd: Command,
    pub data: Box<RawValue>,
}

impl Request {
    /// Build a request with an arbitrary serializable payload
    pub fn new<T: Serialize + ?Sized>(cmd: Command, payload: &T) -> Result<Self> {
        Ok(Self {
            cmd,
            data: serde_json::value::to_raw_value(payload)?,
        })
    }

    /// Build the `report-address` request for a client identity
    pub fn report_address(name: &str) -> Result<Self> {
        Self::new(Command::ReportAddress, name)
    }

    /// Decode the opaque payload as `T`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.data.get())
            .map_err(|e| Error::protocol(format!("invalid payload for {:?}: {}", self.cmd, e)))
    }
}

/// A single response. `data` is `null` for every status defined today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub stat: Status,
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl Response {
    pub fn success() -> Self {
        Self {
            stat: Status::Success,
            data: None,
        }
    }

    pub fn failure() -> Self {
        Self {
            stat: Status::Failure,
            data: None,
        }
    }
}
