//! Task assignments handed out by the coordinator.

use crate::rpc::TaskReply;
use anyhow::bail;
use bytes::Bytes;

/// A map assignment: one input blob, routed into `n_partitions` buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTask {
    pub id: u64,
    /// Blob name of the input unit.
    pub input: String,
    pub n_partitions: u32,
    /// Auxiliary argument bytes forwarded to the workload.
    pub aux: Bytes,
}

/// A reduce assignment: every bucket routed to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceTask {
    pub partition: u32,
    /// Blob names of the buckets to fold, one per producing map task.
    pub buckets: Vec<String>,
    pub aux: Bytes,
}

/// A unit of work, or the signal that none remain.
///
/// Matched exhaustively wherever tasks are dispatched, so a new stage is a
/// compile-time-checked addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Map(MapTask),
    Reduce(ReduceTask),
    /// Terminal sentinel. The worker must stop requesting work once seen.
    Done,
}

impl TryFrom<TaskReply> for Task {
    type Error = anyhow::Error;

    /// Decode the coordinator's string-tagged reply. An empty tag is the
    /// end-of-work sentinel; an unknown tag is a protocol error.
    fn try_from(reply: TaskReply) -> Result<Self, Self::Error> {
        match reply.task_type.as_str() {
            "map" => Ok(Task::Map(MapTask {
                id: reply.map_task_id,
                input: reply.input,
                n_partitions: reply.n_partitions,
                aux: Bytes::from(reply.aux),
            })),
            "reduce" => Ok(Task::Reduce(ReduceTask {
                partition: reply.reduce_task_id,
                buckets: reply.bucket_refs,
                aux: Bytes::from(reply.aux),
            })),
            "" => Ok(Task::Done),
            other => bail!("unknown task type `{other}` from coordinator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_type_is_the_done_sentinel() {
        let reply = TaskReply::default();
        assert_eq!(Task::try_from(reply).unwrap(), Task::Done);
    }

    #[test]
    fn map_reply_decodes() {
        let reply = TaskReply {
            task_type: "map".into(),
            map_task_id: 3,
            input: "unit-00".into(),
            n_partitions: 2,
            ..Default::default()
        };
        let Task::Map(task) = Task::try_from(reply).unwrap() else {
            panic!("expected a map task");
        };
        assert_eq!(task.id, 3);
        assert_eq!(task.input, "unit-00");
        assert_eq!(task.n_partitions, 2);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let reply = TaskReply {
            task_type: "shuffle".into(),
            ..Default::default()
        };
        assert!(Task::try_from(reply).is_err());
    }
}
