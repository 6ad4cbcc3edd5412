//! JSON Lines serialization.

use hibou_shared::{HibouError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize `records` one per line, with `preamble` as the first line when given.
pub fn to_jsonl<T: Serialize>(preamble: Option<&Map<String, Value>>, records: &[T]) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    if let Some(preamble) = preamble {
        write_line(&mut out, preamble)?;
    }
    for record in records {
        write_line(&mut out, record)?;
    }

    Ok(out)
}

fn write_line<T: Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)
        .map_err(|e| HibouError::Storage(format!("failed to serialize record: {e}")))?;
    out.push(b'\n');
    Ok(())
}
