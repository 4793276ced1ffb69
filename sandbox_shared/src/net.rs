//! Peer plumbing and snapshot broadcast.
//!
//! The simulation thread owns a [`Broadcaster`] holding one bounded send
//! buffer per connected peer. Broadcasting clones the frozen frame into
//! every buffer with a non-blocking send; a peer whose buffer is full or
//! whose connection is gone is dropped from the roster and never affects
//! delivery to the others.
//!
//! Actual socket I/O happens on tokio tasks: one writer task per
//! connection drains its buffer and writes length-prefixed frames, and a
//! listener task hands freshly accepted peers to the simulation through a
//! channel. I/O tasks only ever see immutable encoded buffers, never live
//! component storage.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use bytes::Bytes;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

/// Frames a peer may lag behind before it is considered dead.
pub const PEER_SEND_BUFFER: usize = 64;

static NEXT_PEER_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u32);

impl PeerId {
    pub fn new_unique() -> Self {
        PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Send side of one peer's frame buffer.
#[derive(Debug)]
pub struct PeerHandle {
    pub id: PeerId,
    tx: mpsc::Sender<Bytes>,
}

impl PeerHandle {
    pub fn new(id: PeerId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Creates a handle plus the receiver a writer task should drain.
    pub fn channel(id: PeerId) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(PEER_SEND_BUFFER);
        (Self { id, tx }, rx)
    }
}

/// Roster of connected peers and the broadcast fan-out.
#[derive(Debug, Default)]
pub struct Broadcaster {
    peers: Vec<PeerHandle>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&mut self, peer: PeerHandle) {
        info!(peer_id = peer.id.0, "peer joined");
        self.peers.push(peer);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|p| p.id).collect()
    }

    /// Delivers an identical copy of `frame` to every connected peer.
    ///
    /// A peer that fails to accept the frame (disconnected, or its buffer
    /// overflowed) is removed from the roster and excluded from all
    /// subsequent broadcasts. Returns the number of successful deliveries.
    pub fn broadcast(&mut self, frame: &Bytes) -> usize {
        let mut delivered = 0;
        self.peers.retain(|peer| {
            match peer.tx.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(peer_id = peer.id.0, "peer send buffer overflow, dropping peer");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    info!(peer_id = peer.id.0, "peer disconnected");
                    false
                }
            }
        });
        delivered
    }
}

/// Writes buffered frames to one peer's socket until the buffer closes or
/// the socket errors. Frames are prefixed with a `u32` big-endian length,
/// matching the reliable-stream framing used by clients.
pub async fn run_peer_writer(mut stream: TcpStream, mut rx: mpsc::Receiver<Bytes>, id: PeerId) {
    while let Some(frame) = rx.recv().await {
        let len = frame.len() as u32;
        if let Err(e) = stream.write_all(&len.to_be_bytes()).await {
            debug!(peer_id = id.0, error = %e, "peer write failed");
            break;
        }
        if let Err(e) = stream.write_all(&frame).await {
            debug!(peer_id = id.0, error = %e, "peer write failed");
            break;
        }
    }
    debug!(peer_id = id.0, "peer writer stopped");
}

/// Accepts connections and hands new peer handles to the simulation.
///
/// Each accepted socket gets its own writer task. The simulation drains
/// `new_peers` once per iteration, so a peer connecting mid-broadcast only
/// sees the next frame.
pub async fn run_listener(
    listener: TcpListener,
    new_peers: mpsc::Sender<PeerHandle>,
) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await.context("tcp accept")?;
        let id = PeerId::new_unique();
        info!(peer_id = id.0, %addr, "connection accepted");
        let (handle, rx) = PeerHandle::channel(id);
        tokio::spawn(run_peer_writer(stream, rx, id));
        if new_peers.send(handle).await.is_err() {
            // Simulation is gone; stop accepting.
            return Ok(());
        }
    }
}

/// Binds a listener, returning it with the resolved local address.
pub async fn bind(addr: &str) -> anyhow::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("tcp bind {addr}"))?;
    let local = listener.local_addr().context("local addr")?;
    Ok((listener, local))
}
