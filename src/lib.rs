//! Client-side protocols for a leader-based replicated key-value store and a
//! distributed MapReduce job.
//!
//! The store cluster and the job coordinator are external systems this crate
//! does not control; only their client-visible contracts are implemented
//! here: a linearizable [`clerk::Clerk`] that retries stamped requests across
//! replicas, and a [`worker::Worker`] that pulls map/reduce assignments and
//! persists its artifacts through a [`blob::BlobStore`].

use bytes::Bytes;
use std::hash::Hasher;

pub mod blob;
pub mod clerk;
pub mod cmd;
pub mod codec;
pub mod session;
pub mod task;
pub mod transport;
pub mod utils;
pub mod worker;
pub mod workload;

/// Generated gRPC types for the store cluster and the coordinator.
pub mod rpc {
    tonic::include_proto!("mrkv");
}

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair and auxiliary arguments.
///
/// It returns an iterator that yields new key-value pairs.
pub type MapFn = fn(kv: KeyValue, aux: Bytes) -> MapOutput;

/// A reduce function takes in a key, an iterator over values for that key,
/// and an auxiliary argument. It returns the single aggregated value for
/// that key; the reduce stage formats the `<key> <value>` output line.
pub type ReduceFn = fn(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    aux: Bytes,
) -> anyhow::Result<Bytes>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> Bytes {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute the reduce partition for a given key
/// by calculating `ihash(key) % n_partitions`.
///
/// The hash is fixed (FNV with a zero key) so that re-running a map task on
/// the same input routes every record to the same partition.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    let value = hasher.finish() & 0x7fffffff;
    u32::try_from(value).expect("Failed to compute ihash of value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_is_stable_across_calls() {
        for key in [b"a".as_ref(), b"apple", b"", b"the quick brown fox"] {
            assert_eq!(ihash(key), ihash(key));
        }
    }

    #[test]
    fn ihash_fits_in_31_bits() {
        assert!(ihash(b"anything") <= 0x7fffffff);
    }
}
