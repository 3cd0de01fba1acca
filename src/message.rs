//! Wire payloads for streaming (SSE) and polling updates, and the plumbing
//! to turn a `/flags/<key>` or `/segments/<key>` path into a store
//! [`Kind`]+key pair.

use crate::{
    models::{Flag, Segment},
    store::Kind,
};
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed update coming from either transport.
#[derive(Debug)]
pub enum Message {
    /// Full snapshot: atomic store `init`.
    Put(InitData),
    /// A single flag/segment changed: versioned `upsert`.
    Patch(PathUpdate),
    /// A single flag/segment was removed: versioned tombstone `upsert`.
    Delete(PathUpdate),
}

#[derive(Debug, Default, Deserialize)]
pub struct InitData {
    #[serde(default)]
    pub flags: HashMap<String, Flag>,
    #[serde(default)]
    pub segments: HashMap<String, Segment>,
}

/// An update addressed at a single record by path, e.g. `/flags/my-flag`.
#[derive(Debug)]
pub struct PathUpdate {
    pub kind: Kind,
    pub key: String,
    pub flag: Option<Flag>,
    pub segment: Option<Segment>,
    pub version: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    #[error("update path {0:?} does not name a flag or segment")]
    UnknownPath(String),
    #[error("failed to parse update payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Splits a path like `/flags/my-flag` or `segments/my-segment` into a
/// (kind, key) pair.
pub fn parse_path(path: &str) -> Result<(Kind, String), MessageParseError> {
    let trimmed = path.trim_start_matches('/');
    let mut segments = trimmed.splitn(2, '/');
    let collection = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MessageParseError::UnknownPath(path.to_owned()))?;
    let key = segments
        .next()
        .ok_or_else(|| MessageParseError::UnknownPath(path.to_owned()))?;
    let kind = match collection {
        "flags" => Kind::Flags,
        "segments" => Kind::Segments,
        _ => return Err(MessageParseError::UnknownPath(path.to_owned())),
    };
    Ok((kind, key.to_owned()))
}

/// Builds a [`Message::Patch`] from a path and the raw JSON payload of the
/// updated record.
pub fn parse_patch(path: &str, data: serde_json::Value) -> Result<Message, MessageParseError> {
    let (kind, key) = parse_path(path)?;
    let update = match kind {
        Kind::Flags => PathUpdate {
            kind,
            key,
            flag: Some(serde_json::from_value(data)?),
            segment: None,
            version: None,
        },
        Kind::Segments => PathUpdate {
            kind,
            key,
            flag: None,
            segment: Some(serde_json::from_value(data)?),
            version: None,
        },
    };
    Ok(Message::Patch(update))
}

/// Builds a [`Message::Delete`] from a path and the version of the
/// tombstone.
pub fn parse_delete(path: &str, version: u64) -> Result<Message, MessageParseError> {
    let (kind, key) = parse_path(path)?;
    Ok(Message::Delete(PathUpdate {
        kind,
        key,
        flag: None,
        segment: None,
        version: Some(version),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flag_path() {
        let (kind, key) = parse_path("/flags/my-flag").unwrap();
        assert_eq!(kind, Kind::Flags);
        assert_eq!(key, "my-flag");
    }

    #[test]
    fn parses_segment_path() {
        let (kind, key) = parse_path("/segments/my-segment").unwrap();
        assert_eq!(kind, Kind::Segments);
        assert_eq!(key, "my-segment");
    }

    #[test]
    fn rejects_unknown_path() {
        assert!(parse_path("/weird/thing").is_err());
    }
}
