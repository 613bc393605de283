//! Customer domain models
//!
//! This module defines the customer shapes exchanged with the source API,
//! the destination API, and the payload built from one to write the other.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Destination-assigned record identifier
///
/// The destination may hand out numeric or string ids; both are kept as-is
/// and rendered verbatim into resource URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric id
    Number(i64),
    /// String id
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

/// A customer as read from the source API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    /// Natural key used to match destination records
    pub name: String,

    /// Activation timestamp, passed through untouched
    #[serde(default)]
    pub active_at: Option<Value>,

    /// Annual recurring revenue, passed through untouched
    #[serde(default)]
    pub arr: Option<Value>,

    /// Owning team member, passed through untouched
    #[serde(default)]
    pub team_member_id: Option<Value>,

    /// Last modification timestamp, drives the watermark
    ///
    /// A non-string value reads as absent.
    #[serde(default, deserialize_with = "string_or_none")]
    pub updated_at: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

impl SourceRecord {
    /// Create a record with only a name and modification timestamp
    pub fn new(name: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active_at: None,
            arr: None,
            team_member_id: None,
            updated_at: Some(updated_at.into()),
        }
    }
}

/// A customer as stored in the destination API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRecord {
    /// Destination-assigned id
    ///
    /// Absent when a write was acknowledged without echoing the record.
    #[serde(default)]
    pub id: Option<RecordId>,

    /// Customer name
    #[serde(default)]
    pub name: String,

    /// Activation timestamp
    #[serde(default)]
    pub active_at: Option<Value>,

    /// Annual recurring revenue
    #[serde(default)]
    pub arr: Option<Value>,

    /// Owning team member
    #[serde(default)]
    pub team_member_id: Option<Value>,
}

/// Body sent to the destination on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    /// Present only when updating an existing record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    /// Customer name
    pub name: String,

    /// Activation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_at: Option<Value>,

    /// Annual recurring revenue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arr: Option<Value>,

    /// Owning team member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_member_id: Option<Value>,
}

impl CustomerPayload {
    /// Attach a destination id, turning the payload into an update
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Convert into the stored representation once the destination assigned an id
    pub fn into_record(self, id: RecordId) -> DestinationRecord {
        self.with_id(id).into()
    }
}

impl From<CustomerPayload> for DestinationRecord {
    /// The record as written, keeping whatever id the payload carried
    fn from(payload: CustomerPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            active_at: payload.active_at,
            arr: payload.arr,
            team_member_id: payload.team_member_id,
        }
    }
}

impl From<&SourceRecord> for CustomerPayload {
    fn from(record: &SourceRecord) -> Self {
        Self {
            id: None,
            name: record.name.clone(),
            active_at: record.active_at.clone(),
            arr: record.arr.clone(),
            team_member_id: record.team_member_id.clone(),
        }
    }
}
