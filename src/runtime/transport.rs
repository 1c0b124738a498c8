//! [`Communicator`] implementations.
//!
//! [`TcpCommunicator`] links separate processes. The coordinator listens on
//! the cluster address, each worker connects and announces its rank, and all
//! traffic is length-prefixed MessagePack frames. [`LocalCommunicator`] links
//! tasks in one process over channels.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::{ClusterConfig, Communicator, RuntimeError, RuntimeResult, WorkerReport};
use crate::sample::Sample;

const MAX_FRAME: u32 = 1 << 30;
const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Hello { rank: usize },
    Chunk(Vec<Sample>),
    Report(WorkerReport),
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> RuntimeResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = rmp_serde::to_vec_named(value).map_err(|e| RuntimeError::Codec(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME)
        .ok_or_else(|| RuntimeError::Codec(format!("frame of {} bytes", payload.len())))?;
    writer.write_u32(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> RuntimeResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME {
        return Err(RuntimeError::Codec(format!("frame of {} bytes", len)));
    }
    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer).await?;
    rmp_serde::from_slice(&buffer).map_err(|e| RuntimeError::Codec(e.to_string()))
}

fn own_chunk(chunks: Option<Vec<Vec<Sample>>>, size: usize) -> RuntimeResult<Vec<Vec<Sample>>> {
    let chunks = chunks
        .ok_or_else(|| RuntimeError::Protocol("coordinator scatter without chunks".to_string()))?;
    if chunks.len() != size {
        return Err(RuntimeError::Protocol(format!(
            "{} chunks for {} ranks",
            chunks.len(),
            size
        )));
    }
    Ok(chunks)
}

/// Process-to-process communicator over TCP.
pub struct TcpCommunicator {
    rank: usize,
    size: usize,
    /// Coordinator: one stream per worker, ordered by rank. Worker: the
    /// stream to the coordinator.
    peers: Mutex<Vec<TcpStream>>,
}

impl TcpCommunicator {
    /// Joins the cluster described by `cluster`. The coordinator waits until
    /// every worker has connected.
    pub async fn connect(cluster: &ClusterConfig) -> RuntimeResult<Self> {
        if cluster.size == 0 || cluster.rank >= cluster.size {
            return Err(RuntimeError::DistributedUnavailable(format!(
                "rank {} outside a cluster of {}",
                cluster.rank, cluster.size
            )));
        }
        if cluster.size == 1 {
            return Ok(Self {
                rank: 0,
                size: 1,
                peers: Mutex::new(Vec::new()),
            });
        }
        let address = cluster.coordinator.as_deref().ok_or_else(|| {
            RuntimeError::DistributedUnavailable("no coordinator address configured".to_string())
        })?;

        if cluster.is_coordinator() {
            let listener = TcpListener::bind(address).await.map_err(|e| {
                RuntimeError::DistributedUnavailable(format!("cannot listen on {}: {}", address, e))
            })?;
            Self::accept(listener, cluster.size).await
        } else {
            Self::join(address, cluster.rank, cluster.size).await
        }
    }

    /// Accepts `size - 1` workers on `listener`.
    pub async fn accept(listener: TcpListener, size: usize) -> RuntimeResult<Self> {
        info!("Waiting for {} workers on {:?}", size - 1, listener.local_addr());
        let mut slots: Vec<Option<TcpStream>> = (1..size).map(|_| None).collect();
        for _ in 1..size {
            let (mut stream, peer) = listener.accept().await?;
            let rank = match read_frame(&mut stream).await? {
                Frame::Hello { rank } => rank,
                other => {
                    return Err(RuntimeError::Protocol(format!(
                        "expected hello from {}, got {:?}",
                        peer, other
                    )))
                }
            };
            let slot = rank
                .checked_sub(1)
                .and_then(|i| slots.get_mut(i))
                .filter(|slot| slot.is_none())
                .ok_or_else(|| {
                    RuntimeError::Protocol(format!("unexpected worker rank {} from {}", rank, peer))
                })?;
            debug!("Worker {} connected from {}", rank, peer);
            *slot = Some(stream);
        }
        let peers = slots.into_iter().flatten().collect();
        Ok(Self {
            rank: 0,
            size,
            peers: Mutex::new(peers),
        })
    }

    /// Connects to the coordinator as `rank`, retrying while it starts up.
    pub async fn join(address: &str, rank: usize, size: usize) -> RuntimeResult<Self> {
        let mut attempt = 0;
        let mut stream = loop {
            match TcpStream::connect(address).await {
                Ok(stream) => break stream,
                Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                    debug!("Coordinator {} not ready: {}", address, e);
                    attempt += 1;
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                }
                Err(e) => {
                    return Err(RuntimeError::DistributedUnavailable(format!(
                        "cannot reach coordinator {}: {}",
                        address, e
                    )))
                }
            }
        };
        write_frame(&mut stream, &Frame::Hello { rank }).await?;
        Ok(Self {
            rank,
            size,
            peers: Mutex::new(vec![stream]),
        })
    }
}

#[async_trait]
impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn scatter(&self, chunks: Option<Vec<Vec<Sample>>>) -> RuntimeResult<Vec<Sample>> {
        let mut peers = self.peers.lock().await;
        if self.rank == 0 {
            let mut chunks = own_chunk(chunks, self.size)?.into_iter();
            let own = chunks.next().unwrap_or_default();
            for (stream, chunk) in peers.iter_mut().zip(chunks) {
                write_frame(stream, &Frame::Chunk(chunk)).await?;
            }
            return Ok(own);
        }

        let stream = peers
            .first_mut()
            .ok_or_else(|| RuntimeError::Protocol("not connected".to_string()))?;
        match read_frame(stream).await? {
            Frame::Chunk(chunk) => Ok(chunk),
            other => Err(RuntimeError::Protocol(format!("expected chunk, got {:?}", other))),
        }
    }

    async fn gather(&self, report: WorkerReport) -> RuntimeResult<Option<Vec<WorkerReport>>> {
        let mut peers = self.peers.lock().await;
        if self.rank == 0 {
            let mut reports = vec![report];
            for stream in peers.iter_mut() {
                match read_frame(stream).await? {
                    Frame::Report(report) => reports.push(report),
                    other => {
                        return Err(RuntimeError::Protocol(format!(
                            "expected report, got {:?}",
                            other
                        )))
                    }
                }
            }
            return Ok(Some(reports));
        }

        let stream = peers
            .first_mut()
            .ok_or_else(|| RuntimeError::Protocol("not connected".to_string()))?;
        write_frame(stream, &Frame::Report(report)).await?;
        Ok(None)
    }
}

enum Endpoint {
    Coordinator {
        chunks: Vec<mpsc::UnboundedSender<Vec<Sample>>>,
        reports: Mutex<Vec<mpsc::UnboundedReceiver<WorkerReport>>>,
    },
    Worker {
        chunk: Mutex<mpsc::UnboundedReceiver<Vec<Sample>>>,
        report: mpsc::UnboundedSender<WorkerReport>,
    },
}

/// In-process communicator; ranks are tasks of the same program.
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    endpoint: Endpoint,
}

impl LocalCommunicator {
    /// Creates a connected group of `size` communicators, indexed by rank.
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        let mut chunk_senders = Vec::new();
        let mut report_receivers = Vec::new();
        let mut workers = Vec::new();

        for rank in 1..size {
            let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
            let (report_tx, report_rx) = mpsc::unbounded_channel();
            chunk_senders.push(chunk_tx);
            report_receivers.push(report_rx);
            workers.push(LocalCommunicator {
                rank,
                size,
                endpoint: Endpoint::Worker {
                    chunk: Mutex::new(chunk_rx),
                    report: report_tx,
                },
            });
        }

        let mut group = Vec::with_capacity(size);
        if size > 0 {
            group.push(LocalCommunicator {
                rank: 0,
                size,
                endpoint: Endpoint::Coordinator {
                    chunks: chunk_senders,
                    reports: Mutex::new(report_receivers),
                },
            });
        }
        group.extend(workers);
        group
    }
}

fn disconnected(rank: usize) -> RuntimeError {
    RuntimeError::Protocol(format!("rank {} disconnected", rank))
}

#[async_trait]
impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn scatter(&self, chunks: Option<Vec<Vec<Sample>>>) -> RuntimeResult<Vec<Sample>> {
        match &self.endpoint {
            Endpoint::Coordinator { chunks: senders, .. } => {
                let mut chunks = own_chunk(chunks, self.size)?.into_iter();
                let own = chunks.next().unwrap_or_default();
                for (rank, (sender, chunk)) in senders.iter().zip(chunks).enumerate() {
                    sender.send(chunk).map_err(|_| disconnected(rank + 1))?;
                }
                Ok(own)
            }
            Endpoint::Worker { chunk, .. } => {
                chunk.lock().await.recv().await.ok_or_else(|| disconnected(0))
            }
        }
    }

    async fn gather(&self, report: WorkerReport) -> RuntimeResult<Option<Vec<WorkerReport>>> {
        match &self.endpoint {
            Endpoint::Coordinator { reports: receivers, .. } => {
                let mut receivers = receivers.lock().await;
                let mut reports = vec![report];
                for (rank, receiver) in receivers.iter_mut().enumerate() {
                    reports.push(receiver.recv().await.ok_or_else(|| disconnected(rank + 1))?);
                }
                Ok(Some(reports))
            }
            Endpoint::Worker { report: sender, .. } => {
                sender.send(report).map_err(|_| disconnected(0))?;
                Ok(None)
            }
        }
    }
}
