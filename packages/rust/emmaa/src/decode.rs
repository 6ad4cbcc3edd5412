//! Payload decoding for the three formats the platform serves.

use std::io::Read;

use flate2::read::GzDecoder;
use hibou_shared::{HibouError, Result};
use serde::de::DeserializeOwned;

/// Decode a single JSON document.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| HibouError::parse(format!("invalid JSON: {e}")))
}

/// Decode JSON Lines, one value per non-blank line.
///
/// Any malformed line fails the whole body.
pub fn decode_jsonl<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HibouError::parse(format!("JSONL body is not UTF-8: {e}")))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| HibouError::parse(format!("invalid JSONL at line {}: {e}", i + 1)))
        })
        .collect()
}

/// Decode a gzip-compressed JSON document.
pub fn decode_json_gz<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut raw = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(|e| HibouError::parse(format!("invalid gzip stream: {e}")))?;
    decode_json(&raw)
}
