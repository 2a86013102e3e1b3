//! MYLISTADD request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::session::{UdpRequest, UdpResponse};
use crate::error::{ProtocolError, ValidationError};
use crate::protocol::{Outcome, codes};

/// Storage state of a mylist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MyListState {
    #[default]
    Unknown = 0,
    Internal = 1,
    External = 2,
    Deleted = 3,
    Remote = 4,
}

impl MyListState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Internal),
            2 => Some(Self::External),
            3 => Some(Self::Deleted),
            4 => Some(Self::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for MyListState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Internal => "internal",
            Self::External => "external",
            Self::Deleted => "deleted",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

impl FromStr for MyListState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            "deleted" => Ok(Self::Deleted),
            "remote" => Ok(Self::Remote),
            _ => Err(ValidationError::invalid_parameter(
                "state",
                "expected unknown, internal, external, deleted or remote",
            )),
        }
    }
}

/// Which mylist entries the request addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MyListTarget {
    /// One file; `edit` updates an existing entry instead of adding
    File { fid: u64, edit: bool },
    /// Existing entry, always an edit
    Entry { lid: u64 },
    /// Generic file for an anime episode
    Generic { aid: u64, epno: String, edit: bool },
}

/// Existing entry returned by `310 FILE ALREADY IN MYLIST`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyListEntry {
    pub lid: u64,
    pub fid: u64,
    pub eid: u64,
    pub aid: u64,
    pub gid: u64,
    pub date: Option<DateTime<Utc>>,
    pub state: MyListState,
    pub view_date: Option<DateTime<Utc>>,
    pub storage: String,
    pub source: String,
    pub other: String,
    pub file_state: u8,
}

impl MyListEntry {
    /// Parse `lid|fid|eid|aid|gid|date|state|viewdate|storage|source|other|filestate`
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        let line = body.lines().next().unwrap_or_default().trim_end();
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 12 {
            return Err(ProtocolError::malformed(format!(
                "Mylist entry has {} fields, expected 12",
                fields.len()
            )));
        }

        let id = |index: usize, name: &str| -> Result<u64, ProtocolError> {
            fields[index].parse().map_err(|_| {
                ProtocolError::malformed(format!("Mylist field {name} is not a number"))
            })
        };
        let date = |index: usize| -> Option<DateTime<Utc>> {
            fields[index]
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs != 0)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        };

        Ok(Self {
            lid: id(0, "lid")?,
            fid: id(1, "fid")?,
            eid: id(2, "eid")?,
            aid: id(3, "aid")?,
            gid: id(4, "gid")?,
            date: date(5),
            state: fields[6]
                .parse::<u8>()
                .ok()
                .and_then(MyListState::from_code)
                .unwrap_or_default(),
            view_date: date(7),
            storage: super::codec::decode_value(fields[8]),
            source: super::codec::decode_value(fields[9]),
            other: super::codec::decode_value(fields[10]),
            file_state: fields[11].parse().unwrap_or(0),
        })
    }

    pub fn watched(&self) -> bool {
        self.view_date.is_some()
    }
}

/// Successful MYLISTADD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MyListAddResult {
    /// New entry created for a single file
    Added { lid: u64 },
    /// Entries created by a generic add
    AddedCount(u32),
    /// Entries changed by an edit
    Edited(u32),
    /// The file was already in mylist and `edit` was not set
    AlreadyInList(MyListEntry),
}

/// MYLISTADD request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyListAddRequest {
    target: MyListTarget,
    viewed: Option<bool>,
    view_date: Option<DateTime<Utc>>,
    state: Option<MyListState>,
}

impl MyListAddRequest {
    pub fn new(target: MyListTarget) -> Result<Self, ValidationError> {
        match &target {
            MyListTarget::File { fid: 0, .. } => {
                return Err(ValidationError::invalid_parameter("fid", "must be positive"));
            }
            MyListTarget::Entry { lid: 0 } => {
                return Err(ValidationError::invalid_parameter("lid", "must be positive"));
            }
            MyListTarget::Generic { aid, epno, .. } => {
                if *aid == 0 {
                    return Err(ValidationError::invalid_parameter("aid", "must be positive"));
                }
                if epno.trim().is_empty() {
                    return Err(ValidationError::invalid_parameter("epno", "must not be empty"));
                }
            }
            _ => {}
        }
        Ok(Self {
            target,
            viewed: None,
            view_date: None,
            state: None,
        })
    }

    pub fn viewed(mut self, viewed: bool) -> Self {
        self.viewed = Some(viewed);
        self
    }

    pub fn view_date(mut self, date: DateTime<Utc>) -> Self {
        self.view_date = Some(date);
        self
    }

    pub fn state(mut self, state: MyListState) -> Self {
        self.state = Some(state);
        self
    }

    fn edit(&self) -> bool {
        match self.target {
            MyListTarget::File { edit, .. } | MyListTarget::Generic { edit, .. } => edit,
            MyListTarget::Entry { .. } => true,
        }
    }

    fn single_file(&self) -> bool {
        matches!(self.target, MyListTarget::File { .. })
    }
}

fn count<T: FromStr>(body: &str, default: T) -> Result<T, ProtocolError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(default);
    }
    body.parse()
        .map_err(|_| ProtocolError::malformed(format!("Mylist count is not a number: {body}")))
}

impl UdpRequest for MyListAddRequest {
    type Output = MyListAddResult;

    fn command(&self) -> &'static str {
        "MYLISTADD"
    }

    fn params(&self) -> Vec<(String, String)> {
        let flag = |value: bool| (if value { "1" } else { "0" }).to_string();

        let mut params = vec![
            ("filestate".to_string(), "0".to_string()),
            ("edit".to_string(), flag(self.edit())),
        ];
        if let Some(viewed) = self.viewed {
            params.push(("viewed".to_string(), flag(viewed)));
        }
        if let Some(date) = self.view_date {
            params.push(("viewdate".to_string(), date.timestamp().to_string()));
        }
        if let Some(state) = self.state {
            params.push(("state".to_string(), state.code().to_string()));
        }

        match &self.target {
            MyListTarget::File { fid, .. } => params.push(("fid".to_string(), fid.to_string())),
            MyListTarget::Entry { lid } => params.push(("lid".to_string(), lid.to_string())),
            MyListTarget::Generic { aid, epno, .. } => {
                params.push(("aid".to_string(), aid.to_string()));
                params.push(("epno".to_string(), epno.clone()));
                params.push(("generic".to_string(), "1".to_string()));
            }
        }
        params
    }

    fn classify(&self, response: &UdpResponse) -> Outcome<MyListAddResult> {
        let parsed = match response.code {
            codes::MYLIST_ADDED if self.single_file() => {
                count(&response.body, 0).map(|lid| MyListAddResult::Added { lid })
            }
            codes::MYLIST_ADDED => count(&response.body, 0).map(MyListAddResult::AddedCount),
            codes::MYLIST_EDITED => count(&response.body, 1).map(MyListAddResult::Edited),
            codes::FILE_IN_MYLIST => {
                MyListEntry::parse(&response.body).map(MyListAddResult::AlreadyInList)
            }
            codes::NO_SUCH_FILE => return Outcome::Negative("No such file".to_string()),
            codes::NO_SUCH_ANIME => return Outcome::Negative("No such anime".to_string()),
            codes::NO_SUCH_MYLIST_ENTRY => {
                return Outcome::Negative("No such mylist entry".to_string());
            }
            codes::MULTIPLE_FILES_FOUND => {
                return Outcome::Negative("Multiple files found".to_string());
            }
            code => {
                return Outcome::Fatal(format!(
                    "Unexpected MYLISTADD response {code} {}",
                    response.text
                ));
            }
        };
        match parsed {
            Ok(result) => Outcome::Success(result),
            Err(e) => Outcome::Fatal(e.to_string()),
        }
    }
}
