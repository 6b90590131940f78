//! Broadcast relay between editing peers.
//!
//! The relay holds no sketch state and never interprets traffic: every
//! complete line received from one connected peer is forwarded verbatim
//! to every other connected peer. All interpretation happens at the
//! peers themselves.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identifier for one relay-side connection, for logging and for
/// excluding the sender from its own broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Active sessions, keyed by connection id. Each entry is the outbound
/// queue of that session's writer task; a failed send means the session
/// already closed. Added on accept, removed on close, iterated on every
/// relayed line - always under the lock so a broadcast never observes a
/// half-updated membership set.
type Peers = Arc<Mutex<HashMap<ConnId, mpsc::UnboundedSender<String>>>>;

/// The relay server. Binds eagerly so callers learn the port before
/// any peer connects.
pub struct Relay {
    listener: TcpListener,
    peers: Peers,
}

impl Relay {
    /// Bind the listening socket. Failure here is fatal to the caller.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind relay on {addr}"))?;
        info!(addr = %listener.local_addr()?, "relay listening");
        Ok(Self {
            listener,
            peers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task per peer. Accept errors
    /// are connection-level (aborted handshake, fd exhaustion) and
    /// never take the relay down.
    pub async fn run(self) -> Result<()> {
        let mut next_id = 0u64;
        loop {
            let (stream, remote) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(%err, "accept failed, still listening");
                    continue;
                }
            };
            let id = ConnId(next_id);
            next_id += 1;
            info!(%id, %remote, "peer connected");
            let peers = Arc::clone(&self.peers);
            tokio::spawn(serve_peer(id, stream, peers));
        }
    }
}

/// One relay-side session: Connecting -> Active (registered in the
/// broadcast set) -> Closed (deregistered, transport released).
async fn serve_peer(id: ConnId, stream: TcpStream, peers: Peers) {
    let (reader, mut writer) = stream.into_split();

    // Outbound path. The unbounded queue keeps broadcasts from ever
    // blocking on a slow receiver; if this task dies on a write error,
    // the next forward to its closed queue prunes the session.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                debug!(%err, "write side closed");
                break;
            }
            if let Err(err) = writer.write_all(b"\n").await {
                debug!(%err, "write side closed");
                break;
            }
        }
    });

    peers.lock().insert(id, tx);

    // Inbound path: forward each complete line to everyone else.
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(%id, line, "relaying");
                broadcast(&peers, id, &line);
            }
            Ok(None) => {
                info!(%id, "peer hung up");
                break;
            }
            Err(err) => {
                warn!(%id, %err, "read failed, closing session");
                break;
            }
        }
    }

    peers.lock().remove(&id);
    writer_task.abort();
    info!(%id, "session closed");
}

/// Forward a line to every active session except the sender, pruning
/// sessions whose writer has already gone away.
fn broadcast(peers: &Peers, from: ConnId, line: &str) {
    let mut map = peers.lock();
    let mut closed = Vec::new();
    for (&id, tx) in map.iter() {
        if id == from {
            continue;
        }
        if tx.send(line.to_string()).is_err() {
            closed.push(id);
        }
    }
    for id in closed {
        map.remove(&id);
        warn!(%id, "dropped dead session from broadcast set");
    }
}
