//! A MapReduce-compatible implementation of `grep`.
//!
//! Emits one record per matching line, keyed by the input unit name. The
//! reduced value for a unit is its matching line numbers in ascending
//! order, comma separated.

use crate::*;
use anyhow::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use clap::Parser;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
struct Args {
    #[clap(short, long, value_parser)]
    term: String,
}

#[allow(clippy::needless_collect)]
pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args = Args::try_parse_from(serde_json::from_slice::<Vec<String>>(&aux)?)?;
    let term = args.term;

    let s = String::from_utf8(kv.value.as_ref().into())?;
    let lines = s
        .lines()
        .enumerate()
        .filter(|(_, s)| s.contains(&term))
        .map(|(i, _)| i + 1)
        .collect::<Vec<_>>();

    let mut value_buf = BytesMut::with_capacity(lines.len() * 8);
    let key = kv.key.clone();

    let iter = lines.into_iter().map(move |line_num| {
        value_buf.put_u64(line_num as u64);
        Ok(KeyValue {
            key: key.clone(),
            value: value_buf.split().freeze(),
        })
    });
    Ok(Box::new(iter))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut line_numbers = values
        .map(|mut value| value.get_u64())
        .collect::<Vec<_>>();
    line_numbers.sort_unstable();
    let joined = line_numbers.iter().map(u64::to_string).join(",");
    Ok(Bytes::from(joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aux_for(term: &str) -> Bytes {
        let argv = vec!["--term".to_string(), term.to_string()];
        Bytes::from(serde_json::to_vec(&argv).unwrap())
    }

    #[test]
    fn map_emits_matching_line_numbers() {
        let input = KeyValue::new(
            Bytes::from_static(b"unit"),
            Bytes::from_static(b"alpha\nbeta\ngamma\nbeta again\n"),
        );
        let lines: Vec<u64> = map(input, aux_for("beta"))
            .unwrap()
            .map(|kv| kv.unwrap().value.clone().get_u64())
            .collect();
        assert_eq!(lines, [2, 4]);
    }

    #[test]
    fn reduce_sorts_and_joins() {
        let mut buf = BytesMut::new();
        let values: Vec<Bytes> = [17u64, 3, 9]
            .iter()
            .map(|n| {
                buf.put_u64(*n);
                buf.split().freeze()
            })
            .collect();
        let out = reduce(
            Bytes::from_static(b"unit"),
            Box::new(values.into_iter()),
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(out, "3,9,17");
    }
}
