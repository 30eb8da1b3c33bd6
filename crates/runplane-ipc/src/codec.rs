//! Newline-delimited JSON records.
//!
//! One record per line. `serde_json` never emits a raw newline inside a
//! document, so `\n` is an unambiguous record terminator and a record
//! without one is still being written.

use runplane_core::Event;
use serde::Serialize;

use crate::error::IpcError;

/// Serialize one record, including its terminating newline.
pub fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, IpcError> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse one event record. `offset` is only used for error reporting.
pub fn decode_event(line: &[u8], offset: u64) -> Result<Event, IpcError> {
    serde_json::from_slice(line).map_err(|source| IpcError::Deserialization { offset, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use runplane_core::EngineEvent;

    #[test]
    fn test_encoded_record_is_single_line() {
        let event = Event::Engine(EngineEvent::new("multi\nline\nmessage"));
        let bytes = encode_record(&event).unwrap();

        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(decode_event(&bytes, 0).unwrap(), event);
    }

    #[test]
    fn test_decode_reports_offset() {
        let err = decode_event(b"{not json", 42).unwrap_err();
        assert!(matches!(err, IpcError::Deserialization { offset: 42, .. }));
    }
}
