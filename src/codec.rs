//! Record encoding for intermediate buckets.
//!
//! Buckets are streams of JSON-encoded records, one per line. The encoding
//! is self-delimiting (append records, then decode sequentially) and
//! deterministic, so re-running a map task on the same input reproduces a
//! bucket byte for byte.

use crate::KeyValue;
use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Record {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Encode `records` into one bucket blob.
pub fn encode(records: &[KeyValue]) -> Result<Bytes> {
    let mut buf = Vec::new();
    for kv in records {
        let record = Record {
            key: kv.key.to_vec(),
            value: kv.value.to_vec(),
        };
        serde_json::to_writer(&mut buf, &record).context("failed to encode bucket record")?;
        buf.push(b'\n');
    }
    Ok(Bytes::from(buf))
}

/// Decode every record in a bucket blob, in write order.
pub fn decode(buf: &[u8]) -> Result<Vec<KeyValue>> {
    let mut records = Vec::new();
    for record in serde_json::Deserializer::from_slice(buf).into_iter::<Record>() {
        let record = record.context("failed to decode bucket record")?;
        records.push(KeyValue::new(
            Bytes::from(record.key),
            Bytes::from(record.value),
        ));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
        )
    }

    #[test]
    fn decode_preserves_write_order() {
        let records = vec![kv("b", "2"), kv("a", "1"), kv("b", "3")];
        let blob = encode(&records).unwrap();
        assert_eq!(decode(&blob).unwrap(), records);
    }

    #[test]
    fn empty_bucket_decodes_to_nothing() {
        let blob = encode(&[]).unwrap();
        assert!(blob.is_empty());
        assert!(decode(&blob).unwrap().is_empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        let records = vec![kv("x", "left"), kv("y", "right")];
        assert_eq!(encode(&records).unwrap(), encode(&records).unwrap());
    }

    #[test]
    fn binary_payloads_survive() {
        let records = vec![KeyValue::new(
            Bytes::from_static(&[0, 159, 146, 150]),
            Bytes::from_static(&[255, 0, 1]),
        )];
        let blob = encode(&records).unwrap();
        assert_eq!(decode(&blob).unwrap(), records);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode(b"not json").is_err());
    }
}
