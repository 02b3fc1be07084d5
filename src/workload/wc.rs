//! A MapReduce-compatible implementation of word count.
//!

use crate::*;
use anyhow::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let s = String::from_utf8(kv.value.as_ref().into())?;
    let words = s
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>();

    let mut key_buf = BytesMut::new();
    let mut value_buf = BytesMut::with_capacity(words.len() * 8);

    let iter = words.into_iter().map(move |word| {
        key_buf.put_slice(word.into_bytes().as_ref());
        value_buf.put_u64(1);

        let key = key_buf.split().freeze();
        let value = value_buf.split().freeze();

        Ok(KeyValue { key, value })
    });
    Ok(Box::new(iter))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let count: u64 = values.map(|mut value| value.get_u64()).sum();
    Ok(Bytes::from(count.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_lowercases_and_splits_words() {
        let input = KeyValue::new(
            Bytes::from_static(b"unit"),
            Bytes::from_static(b"It is what it is."),
        );
        let words: Vec<String> = map(input, Bytes::new())
            .unwrap()
            .map(|kv| String::from_utf8(kv.unwrap().key.to_vec()).unwrap())
            .collect();
        assert_eq!(words, ["it", "is", "what", "it", "is"]);
    }

    #[test]
    fn reduce_sums_the_ones() {
        let mut one = BytesMut::new();
        one.put_u64(1);
        let one = one.freeze();
        let values = vec![one.clone(), one.clone(), one];
        let out = reduce(
            Bytes::from_static(b"is"),
            Box::new(values.into_iter()),
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(out, "3");
    }
}
