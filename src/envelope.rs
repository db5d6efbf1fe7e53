//! Decoder for the callback-style reply envelope.
//!
//! The service answers with something like
//! `({'STATUS':'OK','Resultado':'<xml/>'});`, which is not JSON. It is made
//! parseable by [`repair`] before decoding.

use serde_json::Value;
use tracing::debug;

use crate::error::DecodeError;

/// Status value the upstream uses for a successful lookup.
pub const STATUS_OK: &str = "OK";

const LEADING_JUNK: usize = 1;
const TRAILING_JUNK: usize = 2;

/// Decoded envelope. Lives only for the duration of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub status: String,
    pub payload: String,
}

/// Turns the raw reply into JSON text.
///
/// Drops exactly one leading and two trailing characters, then replaces
/// every single quote with a double quote. Characters are counted as
/// Unicode scalar values.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] if nothing would be left after
/// stripping.
pub fn repair(raw: &str) -> Result<String, DecodeError> {
    let len = raw.chars().count();
    if len <= LEADING_JUNK + TRAILING_JUNK {
        return Err(DecodeError::TooShort(len));
    }

    let inner: String = raw
        .chars()
        .skip(LEADING_JUNK)
        .take(len - LEADING_JUNK - TRAILING_JUNK)
        .collect();

    Ok(inner.replace('\'', "\""))
}

/// Repairs and decodes a raw reply, checking `STATUS` and pulling out the
/// XML carried in `Resultado`.
///
/// # Errors
///
/// Fails if the repaired text is not JSON, if either field is missing, if
/// `Resultado` is not a string, or if `STATUS` is anything but `"OK"`.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let json = repair(raw)?;
    let value: Value = serde_json::from_str(&json)?;

    let status = match value.get("STATUS") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return Err(DecodeError::MissingField("STATUS")),
    };

    if status != STATUS_OK {
        return Err(DecodeError::NotOk(status));
    }

    let payload = match value.get("Resultado") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(DecodeError::FieldType("Resultado")),
        None => return Err(DecodeError::MissingField("Resultado")),
    };

    debug!(payload_chars = payload.chars().count(), "Envelope decoded");
    Ok(Envelope { status, payload })
}
