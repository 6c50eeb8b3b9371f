//! JSON archive codec for dump and restore.
//!
//! An archive is a JSON array of `{"key": [...], "value": ...}` objects in
//! snapshot order. JSON has no byte type, so binary records carry
//! `"encoding": "base64"` and a standard base64 string as their value.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::key::KeyPath;
use crate::record::{Record, Snapshot, Value};
use crate::{Error, Result};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Encoding {
    Base64,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    key: KeyPath,
    value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<Encoding>,
}

impl From<&Record> for Entry {
    fn from(record: &Record) -> Self {
        match &record.value {
            Value::Structured(json) => Entry {
                key: record.key.clone(),
                value: json.clone(),
                encoding: None,
            },
            Value::Binary(bytes) => Entry {
                key: record.key.clone(),
                value: serde_json::Value::String(STANDARD.encode(bytes)),
                encoding: Some(Encoding::Base64),
            },
        }
    }
}

impl TryFrom<Entry> for Record {
    type Error = Error;

    fn try_from(entry: Entry) -> Result<Self> {
        let value = match entry.encoding {
            None => Value::Structured(entry.value),
            Some(Encoding::Base64) => {
                let text = entry.value.as_str().ok_or_else(|| {
                    Error::ArchiveFormat(format!("binary value at {} is not a string", entry.key))
                })?;
                let bytes = STANDARD
                    .decode(text)
                    .map_err(|e| Error::ArchiveFormat(format!("bad base64 at {}: {}", entry.key, e)))?;
                Value::Binary(bytes)
            }
        };
        Ok(Record { key: entry.key, value })
    }
}

fn entries(snapshot: &[Record]) -> Vec<Entry> {
    snapshot.iter().map(Entry::from).collect()
}

/// Serializes a snapshot into compact archive text, preserving record order.
pub fn encode(snapshot: &[Record]) -> Result<String> {
    Ok(serde_json::to_string(&entries(snapshot))?)
}

/// Same as [`encode`] but indented, for human consumption.
pub fn encode_pretty(snapshot: &[Record]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&entries(snapshot))?)
}

/// Parses archive text. Fails with [`Error::ArchiveFormat`] unless the whole
/// document is an array of well-formed records.
pub fn decode(text: &str) -> Result<Snapshot> {
    let entries: Vec<Entry> = serde_json::from_str(text).map_err(|e| Error::ArchiveFormat(e.to_string()))?;
    entries.into_iter().map(Record::try_from).collect()
}

/// Writes `text` to `path` through a temporary sibling file and a rename, so
/// an interrupted dump never leaves a truncated archive behind.
pub fn write_file(path: &Path, text: &str) -> Result<()> {
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, text)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn key(segments: &[&str]) -> KeyPath {
        KeyPath::new(segments.iter().copied()).unwrap()
    }

    #[test]
    fn test_encode_keeps_field_and_record_order() {
        let snapshot = vec![
            Record::new(key(&["y"]), json!(2)),
            Record::new(key(&["x"]), json!({"name": "Ann"})),
        ];
        assert_eq!(
            encode(&snapshot).unwrap(),
            r#"[{"key":["y"],"value":2},{"key":["x"],"value":{"name":"Ann"}}]"#
        );
    }

    #[test]
    fn test_binary_uses_base64() {
        let snapshot = vec![Record::new(key(&["files", "a.bin"]), vec![0u8, 255, 16])];
        let text = encode(&snapshot).unwrap();
        assert_eq!(text, r#"[{"key":["files","a.bin"],"value":"AP8Q","encoding":"base64"}]"#);
        assert_eq!(decode(&text).unwrap(), snapshot);
    }

    #[test]
    fn test_decode_roundtrip_preserves_order() {
        let snapshot = vec![
            Record::new(key(&["b"]), json!(null)),
            Record::new(key(&["a", "1"]), json!([1, "two", {"three": 3.5}])),
            Record::new(key(&["a", "2"]), vec![1u8; 17]),
        ];
        assert_eq!(decode(&encode(&snapshot).unwrap()).unwrap(), snapshot);
        assert_eq!(decode(&encode_pretty(&snapshot).unwrap()).unwrap(), snapshot);
    }

    #[test]
    fn test_decode_plain_document() {
        let snapshot = decode(r#"[{"key":["x"],"value":1},{"key":["y"],"value":2}]"#).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], Record::new(key(&["x"]), json!(1)));
        assert_eq!(snapshot[1], Record::new(key(&["y"]), json!(2)));
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_documents() {
        let cases = [
            "not json",
            r#"{"key":["x"],"value":1}"#,
            r#"[{"key":["x"]}]"#,
            r#"[{"value":1}]"#,
            r#"[{"key":"x","value":1}]"#,
            r#"[{"key":["x",2],"value":1}]"#,
            r#"[{"key":["x",""],"value":1}]"#,
            r#"[{"key":["x"],"value":1,"encoding":"hex"}]"#,
            r#"[{"key":["x"],"value":7,"encoding":"base64"}]"#,
            r#"[{"key":["x"],"value":"%%%","encoding":"base64"}]"#,
        ];
        for case in cases {
            assert!(matches!(decode(case), Err(Error::ArchiveFormat(_))), "accepted {}", case);
        }
    }

    #[test]
    fn test_write_file_replaces_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.json");
        fs::write(&path, "old").unwrap();

        write_file(&path, "[]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        assert!(!dir.path().join("dump.json.tmp").exists());
    }
}
