//! Linearizable client for the replicated key-value store.
//!
//! The clerk stamps every logical operation with its session's
//! `(client_id, seq_id)` pair and retries that same stamped request across
//! the replica set until a replica confirms it. Reusing the stamp is what
//! lets the store collapse a retry of an operation that a now-unreachable
//! former leader already applied, so delivery is at-least-once but
//! application is at-most-once.

use crate::rpc::{GetReply, GetRequest, KvStatus, Op, PutAppendReply, PutAppendRequest};
use crate::session::Session;
use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// One attempt against one replica.
///
/// An `Err` covers every transport-level failure (unreachable, timeout,
/// connection reset); the clerk treats them all as a possible crash of the
/// contacted replica and moves on to the next one.
#[async_trait]
pub trait KvTransport: Send + Sync {
    /// Number of replicas in the cluster.
    fn servers(&self) -> usize;

    async fn get(&self, server: usize, req: GetRequest) -> Result<GetReply>;

    async fn put_append(&self, server: usize, req: PutAppendRequest) -> Result<PutAppendReply>;
}

/// Lets a caller abandon an in-flight clerk operation.
///
/// Cloned tokens share the same cancellation state.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Cancel every operation guarded by this token or a clone of it.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded exponential backoff with jitter between retry attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub base: f64,
    /// Jitter factor in `[0.0, 1.0]`, applied as a symmetric fraction of
    /// the current delay.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(1),
            base: 2.0,
            jitter: 0.5,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.powi(attempt.min(32) as i32);
        let capped = self
            .initial
            .mul_f64(exp)
            .min(self.max)
            .as_secs_f64();
        let spread = capped * self.jitter;
        let jittered = if spread > 0.0 {
            capped + rand::rng().random_range(-spread / 2.0..=spread / 2.0)
        } else {
            capped
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// The store client. Owns its [`Session`] exclusively; a clerk is not meant
/// to be shared across concurrent callers.
pub struct Clerk<T> {
    transport: T,
    session: Session,
    backoff: Backoff,
    cancel: Option<CancelToken>,
}

impl<T: KvTransport> Clerk<T> {
    pub fn new(transport: T) -> Self {
        let session = Session::new(transport.servers());
        Self {
            transport,
            session,
            backoff: Backoff::default(),
            cancel: None,
        }
    }

    /// Attach a cancellation token. Without one, operations retry forever.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fetch the current value for `key`, or the empty string if the key
    /// does not exist.
    ///
    /// Keeps trying forever in the face of every non-terminal outcome; the
    /// only possible error is cancellation.
    pub async fn get(&mut self, key: &str) -> Result<String> {
        let req = GetRequest {
            key: key.to_string(),
            client_id: self.session.client_id(),
            seq_id: self.session.next_seq(),
        };
        let mut server = self.session.leader_hint();
        let mut attempt = 0;
        loop {
            match self.transport.get(server, req.clone()).await {
                Ok(reply) => match reply.status() {
                    KvStatus::Ok => {
                        self.session.confirm_leader(server);
                        return Ok(reply.value);
                    }
                    KvStatus::NoSuchKey => {
                        self.session.confirm_leader(server);
                        return Ok(String::new());
                    }
                    KvStatus::WrongLeader => {
                        server = self.session.next_server(server);
                    }
                },
                Err(err) => {
                    debug!(server, %err, "get attempt failed, trying next replica");
                    server = self.session.next_server(server);
                }
            }
            self.pause(attempt).await?;
            attempt += 1;
        }
    }

    /// Set `key` to `value`.
    pub async fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.put_append(key, value, Op::Put).await
    }

    /// Append `value` to the existing value of `key`, creating it if absent.
    pub async fn append(&mut self, key: &str, value: &str) -> Result<()> {
        self.put_append(key, value, Op::Append).await
    }

    async fn put_append(&mut self, key: &str, value: &str, op: Op) -> Result<()> {
        let req = PutAppendRequest {
            key: key.to_string(),
            value: value.to_string(),
            op: op as i32,
            client_id: self.session.client_id(),
            seq_id: self.session.next_seq(),
        };
        let mut server = self.session.leader_hint();
        let mut attempt = 0;
        loop {
            match self.transport.put_append(server, req.clone()).await {
                Ok(reply) => match reply.status() {
                    KvStatus::Ok => {
                        self.session.confirm_leader(server);
                        return Ok(());
                    }
                    // The store never answers NoSuchKey to a write; treat it
                    // like a leadership miss rather than a success.
                    KvStatus::NoSuchKey | KvStatus::WrongLeader => {
                        server = self.session.next_server(server);
                    }
                },
                Err(err) => {
                    debug!(server, %err, "put/append attempt failed, trying next replica");
                    server = self.session.next_server(server);
                }
            }
            self.pause(attempt).await?;
            attempt += 1;
        }
    }

    /// Sleep out the backoff for retry `attempt`, bailing if the caller has
    /// cancelled the operation.
    async fn pause(&self, attempt: u32) -> Result<()> {
        let delay = self.backoff.delay(attempt);
        match &self.cancel {
            Some(token) => {
                if token.is_cancelled() {
                    bail!("operation cancelled");
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = token.cancelled() => bail!("operation cancelled"),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
