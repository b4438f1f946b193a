//! Wire protocol definitions for the relay
//!
//! Peers send requests wrapped in a small JSON envelope, one text frame per
//! request:
//!
//! ```text
//! { "type": "GET" | "POST", "message": { "name": "<slot>", "data": "<value>" } }
//! ```
//!
//! Frames sent by the relay (GET replies and POST broadcasts) are not
//! wrapped; they carry the raw slot value.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Slot name peers use unless configured otherwise
pub const DEFAULT_SLOT: &str = "default";

/// Errors raised while decoding or encoding an envelope
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not a valid envelope
    #[error("Malformed request envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope names no slot
    #[error("Request envelope has an empty slot name")]
    EmptySlotName,

    /// Frame exceeds the configured maximum payload
    #[error("Frame too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Request type carried in the envelope's `type` field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Read a slot's current value
    Get,
    /// Overwrite a slot and broadcast the new value
    Post,
    /// Anything else, kept verbatim for logging
    Unknown(String),
}

impl RequestKind {
    /// Parse a `type` field, ignoring case
    pub fn parse(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "GET" => RequestKind::Get,
            "POST" => RequestKind::Post,
            _ => RequestKind::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestKind::Get => "GET",
            RequestKind::Post => "POST",
            RequestKind::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    message: SlotMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct SlotMessage {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

/// A decoded peer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: RequestKind,
    pub name: String,
    pub data: Option<String>,
}

impl Request {
    /// Build a GET for `name`
    pub fn get(name: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Get,
            name: name.into(),
            data: None,
        }
    }

    /// Build a POST storing `data` under `name`
    pub fn post(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Post,
            name: name.into(),
            data: Some(data.into()),
        }
    }

    /// Decode one inbound frame
    ///
    /// The `type` field is normalized, so `"post"` and `"POST"` decode the
    /// same. Unrecognized types decode successfully as
    /// [`RequestKind::Unknown`]; it is up to the caller to ignore them.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_slice(frame)?;

        if envelope.message.name.is_empty() {
            return Err(ProtocolError::EmptySlotName);
        }

        Ok(Self {
            kind: RequestKind::parse(&envelope.kind),
            name: envelope.message.name,
            data: envelope.message.data,
        })
    }

    /// Encode into a single text frame
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let envelope = Envelope {
            kind: self.kind.as_str().to_string(),
            message: SlotMessage {
                name: self.name.clone(),
                data: self.data.clone(),
            },
        };

        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }
}

/// Reject frames larger than `max` bytes
pub fn check_frame_size(size: usize, max: usize) -> Result<(), ProtocolError> {
    if size > max {
        return Err(ProtocolError::PayloadTooLarge { size, max });
    }
    Ok(())
}
