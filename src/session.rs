//! Client-side peer session.
//!
//! Owns the connection to the relay: a reader task that applies every
//! decoded remote operation to the local [`SharedSketch`], and an
//! ordered outbound write path for locally generated operations. The
//! GUI embedder draws from `SharedSketch::snapshot` whenever the
//! redraw [`Notify`] fires.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::shapes::{Rgb, Shape};
use crate::sketch::{ShapeId, SharedSketch};
use crate::wire::{self, Operation};

/// One live connection to the relay.
///
/// Dropping the session aborts both I/O tasks and releases the
/// transport; there is no shared global send handle, so a process may
/// hold several sessions at once.
pub struct PeerSession {
    sketch: Arc<SharedSketch>,
    outbound: mpsc::UnboundedSender<String>,
    redraw: Arc<Notify>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl PeerSession {
    /// Connect to the relay and start the inbound read loop.
    /// Failure to connect is fatal to the caller.
    pub async fn connect(addr: SocketAddr, sketch: Arc<SharedSketch>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to relay at {addr}"))?;
        info!(%addr, "connected to relay");
        let (reader, mut writer) = stream.into_split();

        // Outbound lines leave in exactly the order they were queued,
        // which is the order the operations were applied locally.
        let (outbound, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(err) = writer.write_all(line.as_bytes()).await {
                    warn!(%err, "write to relay failed");
                    break;
                }
                if let Err(err) = writer.write_all(b"\n").await {
                    warn!(%err, "write to relay failed");
                    break;
                }
            }
        });

        let redraw = Arc::new(Notify::new());
        let reader_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&sketch),
            Arc::clone(&redraw),
        ));

        Ok(Self {
            sketch,
            outbound,
            redraw,
            reader_task,
            writer_task,
        })
    }

    /// The sketch this session applies remote operations to.
    pub fn sketch(&self) -> &Arc<SharedSketch> {
        &self.sketch
    }

    /// Handle the render consumer awaits; fired after every inbound
    /// line, whatever its outcome.
    pub fn redraw(&self) -> Arc<Notify> {
        Arc::clone(&self.redraw)
    }

    /// Encode and queue one operation for immediate send, no batching.
    pub fn send(&self, op: &Operation) -> Result<()> {
        self.outbound
            .send(wire::encode(op))
            .context("session transport closed")
    }

    /// Local draw: add to the sketch first, then announce it.
    pub fn draw_shape(&self, shape: Shape) -> Result<ShapeId> {
        let id = self.sketch.add(shape.clone());
        self.send(&Operation::Draw(shape))?;
        Ok(id)
    }

    /// Local move. Nothing is sent if the shape is already gone.
    pub fn move_shape(&self, id: ShapeId, dx: i32, dy: i32) -> Result<()> {
        if self.sketch.translate(id, dx, dy).is_ok() {
            self.send(&Operation::Move { id, dx, dy })?;
        }
        Ok(())
    }

    /// Local recolor. Nothing is sent if the shape is already gone.
    pub fn recolor_shape(&self, id: ShapeId, color: Rgb) -> Result<()> {
        if self.sketch.recolor(id, color).is_ok() {
            self.send(&Operation::Recolor { id, color })?;
        }
        Ok(())
    }

    /// Local delete. Nothing is sent if the shape is already gone.
    pub fn delete_shape(&self, id: ShapeId) -> Result<()> {
        if self.sketch.remove(id).is_ok() {
            self.send(&Operation::Delete { id })?;
        }
        Ok(())
    }

    /// Tear the session down. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        // Interrupt the blocked read and release the transport.
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// Inbound loop: decode each line, apply it, request a redraw.
/// Malformed lines and unknown-id races are dropped, never fatal.
async fn read_loop(reader: OwnedReadHalf, sketch: Arc<SharedSketch>, redraw: Arc<Notify>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match wire::decode(&line) {
                    // apply already logs unknown-id no-ops.
                    Ok(op) => {
                        let _ = sketch.apply(&op);
                    }
                    Err(err) => warn!(%err, line, "dropping malformed line"),
                }
                redraw.notify_one();
            }
            Ok(None) => {
                info!("relay hung up");
                break;
            }
            Err(err) => {
                warn!(%err, "read from relay failed");
                break;
            }
        }
    }
}
