//! The JSON wire envelope exchanged on every transport.
//!
//! Wire format: exactly one JSON document per socket read or serial line.
//!
//! ```text
//! Request:  {"Api": "<operation>", "Data": {...}}          (Result optional)
//! Response: {"Api": "", "Result": 0|1, "Data": {...}}
//! ```
//!
//! Inbound documents may omit `Result` and `Data`; outbound documents always
//! carry all three keys. `Result` is `1` for success and `0` for failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while decoding a wire document.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The bytes were not valid UTF-8.
    #[error("request is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The text was not a valid JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A recognized operation carried a `Data` object that does not match
    /// its expected payload shape.
    #[error("invalid payload for `{api}`: {source}")]
    InvalidPayload {
        api: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One wire document: `{Api, Result, Data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation name. Empty on responses.
    #[serde(rename = "Api", default)]
    pub api: String,

    /// Outcome flag: `1` success, `0` failure. Requests leave it unset.
    #[serde(rename = "Result", default, with = "int_flag")]
    pub result: bool,

    /// Operation-dependent payload object.
    #[serde(rename = "Data", default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Envelope {
    /// Builds a request envelope for `api` with the given payload object.
    pub fn request(api: &str, data: Value) -> Self {
        Self {
            api: api.to_string(),
            result: false,
            data,
        }
    }

    /// Builds a success response carrying `data`.
    pub fn success(data: Value) -> Self {
        Self {
            api: String::new(),
            result: true,
            data,
        }
    }

    /// Builds a failure response with an empty payload.
    pub fn failure() -> Self {
        Self {
            api: String::new(),
            result: false,
            data: empty_object(),
        }
    }

    /// Decodes one envelope from a raw socket/serial read.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] for non-UTF-8 bytes and
    /// [`ProtocolError::Malformed`] for anything that is not a JSON object
    /// of the envelope shape.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text.trim())?)
    }

    /// Encodes the envelope as a single JSON document.
    ///
    /// Serialization of an envelope cannot fail: the payload is already a
    /// `serde_json::Value` and the remaining fields are plain scalars.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

/// `Result` travels as an integer (`0`/`1`) but is a flag in memory.
mod int_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
        let raw = u8::deserialize(de)?;
        Ok(raw != 0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
