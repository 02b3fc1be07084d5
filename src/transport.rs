//! gRPC-backed transports for the clerk and the worker.

use crate::clerk::KvTransport;
use crate::rpc::coordinator_client::CoordinatorClient;
use crate::rpc::kv_store_client::KvStoreClient;
use crate::rpc::{
    GetReply, GetRequest, MessageKind, PutAppendReply, PutAppendRequest, TaskReply, WorkRequest,
};
use crate::task::Task;
use crate::worker::TaskSource;
use anyhow::Result;
use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::warn;

/// One lazily-connected channel per store replica.
///
/// Connections are established on first use, so a replica that is down at
/// startup only surfaces as a per-attempt transport error, which is exactly
/// what the clerk's retry loop expects.
pub struct GrpcKvCluster {
    clients: Vec<KvStoreClient<Channel>>,
}

impl GrpcKvCluster {
    pub fn new(addrs: &[String]) -> Result<Self> {
        let mut clients = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let endpoint = Endpoint::from_shared(format!("http://{addr}"))?;
            clients.push(KvStoreClient::new(endpoint.connect_lazy()));
        }
        Ok(Self { clients })
    }
}

#[async_trait]
impl KvTransport for GrpcKvCluster {
    fn servers(&self) -> usize {
        self.clients.len()
    }

    async fn get(&self, server: usize, req: GetRequest) -> Result<GetReply> {
        let mut client = self.clients[server].clone();
        Ok(client.get(Request::new(req)).await?.into_inner())
    }

    async fn put_append(&self, server: usize, req: PutAppendRequest) -> Result<PutAppendReply> {
        let mut client = self.clients[server].clone();
        Ok(client.put_append(Request::new(req)).await?.into_inner())
    }
}

/// The coordinator over gRPC.
pub struct GrpcCoordinator {
    client: CoordinatorClient<Channel>,
}

impl GrpcCoordinator {
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = CoordinatorClient::connect(format!("http://{addr}")).await?;
        Ok(Self { client })
    }

    async fn request(&mut self, req: WorkRequest) -> Result<TaskReply> {
        Ok(self.client.request_work(Request::new(req)).await?.into_inner())
    }
}

#[async_trait]
impl TaskSource for GrpcCoordinator {
    async fn next_task(&mut self) -> Result<Task> {
        let req = WorkRequest {
            kind: MessageKind::NextTask as i32,
            ..Default::default()
        };
        match self.client.request_work(Request::new(req)).await {
            Ok(reply) => Task::try_from(reply.into_inner()),
            // An unreachable coordinator means the job is over as far as
            // this worker is concerned.
            Err(status) => {
                warn!(%status, "coordinator unreachable, treating as end of work");
                Ok(Task::Done)
            }
        }
    }

    async fn report_bucket(&mut self, map_task: u64, partition: u32, addr: &str) -> Result<()> {
        self.request(WorkRequest {
            kind: MessageKind::BucketLocation as i32,
            task_id: map_task,
            partition,
            payload: addr.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn finish_map(&mut self, map_task: u64) -> Result<()> {
        self.request(WorkRequest {
            kind: MessageKind::FinishMap as i32,
            task_id: map_task,
            ..Default::default()
        })
        .await?;
        Ok(())
    }

    async fn finish_reduce(&mut self, partition: u32) -> Result<()> {
        self.request(WorkRequest {
            kind: MessageKind::FinishReduce as i32,
            partition,
            ..Default::default()
        })
        .await?;
        Ok(())
    }
}
