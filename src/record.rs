use crate::key::KeyPath;
use crate::{Error, Result};

const TAG_STRUCTURED: u8 = 0x00;
const TAG_BINARY: u8 = 0x01;

/// A stored value: JSON data or an opaque byte blob.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Structured(serde_json::Value),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    /// Serializes the value into its tagged engine representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Value::Structured(json) => {
                let mut out = vec![TAG_STRUCTURED];
                serde_json::to_writer(&mut out, json)?;
                Ok(out)
            }
            Value::Binary(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + 1);
                out.push(TAG_BINARY);
                out.extend_from_slice(bytes);
                Ok(out)
            }
        }
    }

    /// Parses a tagged engine representation.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&TAG_STRUCTURED, body)) => Ok(Value::Structured(serde_json::from_slice(body)?)),
            Some((&TAG_BINARY, body)) => Ok(Value::Binary(body.to_vec())),
            Some((tag, _)) => Err(Error::Storage(format!("unknown value tag {:#04x}", tag))),
            None => Err(Error::Storage("empty stored value".to_string())),
        }
    }

    /// Raw payload without interpretation: the bytes of a binary value, or
    /// the stored JSON text of a structured one.
    pub(crate) fn payload(bytes: &[u8]) -> Result<Vec<u8>> {
        match bytes.split_first() {
            Some((_, body)) => Ok(body.to_vec()),
            None => Err(Error::Storage("empty stored value".to_string())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Structured(json)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

/// One key/value entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub key: KeyPath,
    pub value: Value,
}

impl Record {
    pub fn new(key: KeyPath, value: impl Into<Value>) -> Self {
        Self { key, value: value.into() }
    }
}

/// Records sharing a common prefix, in engine key order.
pub type Snapshot = Vec<Record>;
