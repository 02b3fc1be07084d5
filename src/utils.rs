//! Small helpers shared by workloads and stages.

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Convert a [`String`] to [`Bytes`].
#[inline]
pub fn string_to_bytes(s: String) -> Bytes {
    Bytes::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_round_trips() {
        let s = "grouped by key".to_string();
        assert_eq!(string_from_bytes(string_to_bytes(s.clone())).unwrap(), s);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        assert!(string_from_bytes(Bytes::from_static(&[0xff, 0xfe])).is_err());
    }
}
