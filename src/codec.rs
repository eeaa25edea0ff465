//! Length-prefixed frame codec for snapshot files.
//!
//! A file is a concatenation of frames with no header, footer, or
//! separator. Each frame is a 2-byte unsigned big-endian length `L`
//! followed by exactly `L` bytes of UTF-8 JSON for one record. An empty
//! buffer is a valid encoding of zero records.

use crate::error::{Result, VaultError};
use crate::types::PersistedRecord;

/// Frame header size: 2-byte big-endian length field.
const FRAME_HEADER_SIZE: usize = 2;

/// Maximum payload size of a single frame.
///
/// The 2-byte length field represents 0..=65535 exactly, so this is the
/// largest bound that cannot overflow the header.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Encode a sequence of records into a single byte buffer.
///
/// Records are serialized as compact JSON in input order. Fails with
/// [`VaultError::FrameTooLarge`] if any record's UTF-8 JSON exceeds
/// [`MAX_FRAME_LEN`]; nothing partial is returned on failure.
pub fn encode(records: &[PersistedRecord]) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for record in records {
        let payload = serde_json::to_vec(record)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(VaultError::FrameTooLarge(payload.len()));
        }
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&payload);
    }

    Ok(out)
}

/// Decode a byte buffer into the sequence of records it contains.
///
/// Decoding is strict: the buffer must be exactly consumed. A buffer that
/// ends mid-header fails with [`VaultError::TruncatedHeader`], mid-payload
/// with [`VaultError::TruncatedPayload`]; a payload that is not valid UTF-8
/// JSON fails with [`VaultError::MalformedRecord`]. An empty buffer decodes
/// to an empty sequence.
pub fn decode(bytes: &[u8]) -> Result<Vec<PersistedRecord>> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < FRAME_HEADER_SIZE {
            return Err(VaultError::TruncatedHeader { offset });
        }

        let declared = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
        let payload_start = offset + FRAME_HEADER_SIZE;

        if bytes.len() - payload_start < declared {
            return Err(VaultError::TruncatedPayload {
                offset,
                declared,
                available: bytes.len() - payload_start,
            });
        }

        let payload = &bytes[payload_start..payload_start + declared];
        let record = serde_json::from_slice(payload).map_err(|e| VaultError::MalformedRecord {
            offset,
            message: e.to_string(),
        })?;

        records.push(record);
        offset = payload_start + declared;
    }

    Ok(records)
}

/// Decode a buffer expected to hold exactly one JSON object record.
pub fn decode_single_object(bytes: &[u8]) -> Result<PersistedRecord> {
    let mut records = decode(bytes)?;

    if records.len() != 1 {
        return Err(VaultError::NotASingleObject(format!(
            "found {} records",
            records.len()
        )));
    }

    let record = records.pop().expect("len checked above");
    if !record.is_object() {
        return Err(VaultError::NotASingleObject(
            "record is not a JSON object".into(),
        ));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encode_known_bytes() {
        let records = vec![json!("Hello"), json!([1, 2, 3]), json!(42)];
        let bytes = encode(&records).unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x07, 0x22, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x22, // "Hello"
            0x00, 0x07, 0x5B, 0x31, 0x2C, 0x32, 0x2C, 0x33, 0x5D, // [1,2,3]
            0x00, 0x02, 0x34, 0x32, // 42
        ];
        assert_eq!(bytes, expected);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_empty_buffer_decodes_to_empty_sequence() {
        assert_eq!(decode(&[]).unwrap(), Vec::<Value>::new());
        assert_eq!(encode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_oversize_record_fails() {
        let big = json!("x".repeat(MAX_FRAME_LEN + 10));
        let result = encode(&[json!(1), big, json!(2)]);
        assert!(matches!(result, Err(VaultError::FrameTooLarge(_))));
    }

    #[test]
    fn test_max_size_record_roundtrips() {
        // JSON string adds two quote bytes, so the payload lands exactly
        // on the frame limit.
        let value = json!("x".repeat(MAX_FRAME_LEN - 2));
        let bytes = encode(std::slice::from_ref(&value)).unwrap();
        assert_eq!(bytes.len(), FRAME_HEADER_SIZE + MAX_FRAME_LEN);
        assert_eq!(decode(&bytes).unwrap(), vec![value]);
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = encode(&[json!({"a": 1})]).unwrap();
        bytes.pop();
        assert!(matches!(
            decode(&bytes),
            Err(VaultError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut bytes = encode(&[json!(true)]).unwrap();
        // Leave a single stray byte after a complete frame.
        bytes.push(0x00);
        assert!(matches!(
            decode(&bytes),
            Err(VaultError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn test_zero_length_frame_is_malformed() {
        // A declared length of zero yields an empty payload, which is not
        // valid JSON.
        let bytes = [0x00, 0x00];
        assert!(matches!(
            decode(&bytes),
            Err(VaultError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_malformed_payload() {
        let payload = b"not json";
        let mut bytes = vec![0x00, payload.len() as u8];
        bytes.extend_from_slice(payload);
        let result = decode(&bytes);
        assert!(matches!(result, Err(VaultError::MalformedRecord { offset: 0, .. })));
    }

    #[test]
    fn test_decode_single_object() {
        let bytes = encode(&[json!({"k": "v"})]).unwrap();
        assert_eq!(decode_single_object(&bytes).unwrap(), json!({"k": "v"}));
    }

    #[test]
    fn test_decode_single_object_rejects_multiple() {
        let bytes = encode(&[json!({}), json!({})]).unwrap();
        assert!(matches!(
            decode_single_object(&bytes),
            Err(VaultError::NotASingleObject(_))
        ));
    }

    #[test]
    fn test_decode_single_object_rejects_non_object() {
        let bytes = encode(&[json!([1, 2])]).unwrap();
        assert!(matches!(
            decode_single_object(&bytes),
            Err(VaultError::NotASingleObject(_))
        ));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,32}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
                prop::collection::hash_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::from(serde_json::Map::from_iter(m))),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(records in prop::collection::vec(arb_json(), 0..8)) {
            let bytes = encode(&records).unwrap();
            let decoded = decode(&bytes).unwrap();
            prop_assert_eq!(decoded, records);
        }
    }
}
