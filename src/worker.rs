//! The worker: pulls one assignment at a time from the coordinator, runs the
//! map or reduce stage, reports completion, and loops until the coordinator
//! has nothing left.
//!
//! Stage I/O failures are fatal: they propagate out of [`Worker::run`] and
//! are expected to take the process down so the coordinator's failure
//! detector can reassign the task. Nothing here retries locally.

use crate::blob::{bucket_name, output_name, BlobStore};
use crate::codec;
use crate::task::{MapTask, ReduceTask, Task};
use crate::utils::string_from_bytes;
use crate::{ihash, KeyValue, Workload};
use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use itertools::Itertools;
use tracing::info;

/// The coordinator as seen by one worker.
///
/// All progress flows through these four calls; the worker never talks to
/// other workers directly.
#[async_trait]
pub trait TaskSource: Send {
    /// Ask for the next assignment. [`Task::Done`] means no work remains
    /// and the worker must stop asking.
    async fn next_task(&mut self) -> Result<Task>;

    /// Tell the coordinator where a finished bucket lives, so it can point
    /// the reduce worker for `partition` at it later.
    async fn report_bucket(&mut self, map_task: u64, partition: u32, addr: &str) -> Result<()>;

    async fn finish_map(&mut self, map_task: u64) -> Result<()>;

    async fn finish_reduce(&mut self, partition: u32) -> Result<()>;
}

type Buckets = DashMap<u32, Vec<KeyValue>>;

/// A single sequential worker: one task held at a time, one remote call in
/// flight at a time.
pub struct Worker<C, B> {
    source: C,
    store: B,
    workload: Workload,
}

impl<C: TaskSource, B: BlobStore> Worker<C, B> {
    pub fn new(source: C, store: B, workload: Workload) -> Self {
        Self {
            source,
            store,
            workload,
        }
    }

    /// Drive the task loop to completion. Returns once the coordinator
    /// hands out the end-of-work sentinel; any stage error is fatal and
    /// surfaces here.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.source.next_task().await? {
                Task::Map(task) => self.run_map(task).await?,
                Task::Reduce(task) => self.run_reduce(task).await?,
                Task::Done => {
                    info!("no work remaining, worker done");
                    return Ok(());
                }
            }
        }
    }

    /// Map stage: read the input unit in full, run the map function, route
    /// every record to `ihash(key) % n_partitions`, and publish one bucket
    /// per partition. Buckets are reported before the task is marked done,
    /// so a reduce worker only ever reads completed buckets.
    async fn run_map(&mut self, task: MapTask) -> Result<()> {
        ensure!(task.n_partitions > 0, "map task {} has no partitions", task.id);
        info!(id = task.id, input = %task.input, "starting map task");

        let content = self
            .store
            .get(&task.input)
            .await
            .with_context(|| format!("cannot read input unit `{}`", task.input))?;
        let input_kv = KeyValue::new(Bytes::from(task.input.clone()), content);

        let buckets: Buckets = Buckets::new();
        let map_fn = self.workload.map_fn;
        for item in map_fn(input_kv, task.aux.clone())? {
            let kv = item?;
            let partition = ihash(&kv.key) % task.n_partitions;
            buckets.entry(partition).or_default().push(kv);
        }

        // Every partition gets a bucket, empty ones included, so the
        // reduce side can always find (map id, partition).
        for partition in 0..task.n_partitions {
            let records = buckets
                .remove(&partition)
                .map(|(_, records)| records)
                .unwrap_or_default();
            let name = bucket_name(task.id, partition);
            self.store
                .put(&name, codec::encode(&records)?)
                .await
                .with_context(|| format!("cannot write bucket `{name}`"))?;
            self.source.report_bucket(task.id, partition, &name).await?;
        }

        self.source.finish_map(task.id).await
    }

    /// Reduce stage: concatenate every assigned bucket, sort by key so equal
    /// keys are contiguous, fold each group through the reduce function, and
    /// publish one `<key> <value>` line per key in ascending key order.
    async fn run_reduce(&mut self, task: ReduceTask) -> Result<()> {
        info!(
            partition = task.partition,
            buckets = task.buckets.len(),
            "starting reduce task"
        );

        let mut records = Vec::new();
        for addr in &task.buckets {
            let blob = self
                .store
                .get(addr)
                .await
                .with_context(|| format!("cannot read bucket `{addr}`"))?;
            records.extend(codec::decode(&blob)?);
        }
        // Stable sort: equal keys stay contiguous, value order within a key
        // is not part of the contract.
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let reduce_fn = self.workload.reduce_fn;
        let mut out = BytesMut::new();
        for (key, group) in &records.into_iter().chunk_by(KeyValue::key) {
            let values = group.map(KeyValue::into_value);
            let value = reduce_fn(key.clone(), Box::new(values), task.aux.clone())?;
            let line = format!(
                "{} {}\n",
                string_from_bytes(key)?,
                string_from_bytes(value)?
            );
            out.put(line.as_bytes());
        }

        let name = output_name(task.partition);
        self.store
            .put(&name, out.freeze())
            .await
            .with_context(|| format!("cannot write output `{name}`"))?;
        self.source.finish_reduce(task.partition).await
    }
}
