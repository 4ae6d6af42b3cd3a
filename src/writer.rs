//! Dedicated writer task: the single write path of a connection.
//!
//! Every caller that sends a request hands its encoded frame to a
//! [`WriterHandle`]; one task per connection owns the socket's sink and
//! writes frames in the order they were queued. Frames can never interleave
//! on the wire, and no caller ever holds a lock across socket I/O.
//!
//! # Architecture
//!
//! ```text
//! send() 1 ─┐
//! send() 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► FrameSink
//! keepalive ┘
//! ```
//!
//! Frames that are already queued when the task wakes up are fed to the sink
//! together and flushed once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, RoomwireError};
use crate::stats::SessionStats;
use crate::transport::FrameSink;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default time a caller waits for room in a full queue.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames to feed before a flush.
const MAX_BATCH_SIZE: usize = 64;

/// A frame queued for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A text frame.
    Text(String),
    /// Flush everything queued before, close the socket and stop.
    Close,
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
    /// How long `send` waits while the queue is full.
    pub send_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Handle for queueing frames on one connection's writer task.
///
/// Cheap to clone. Once the task has stopped every send fails with
/// [`RoomwireError::ConnectionLost`].
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    pending: Arc<AtomicUsize>,
    timeout: Duration,
}

impl WriterHandle {
    /// Queue a frame, waiting up to the send timeout for queue space.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        let result = match tokio::time::timeout(self.timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => Err(RoomwireError::ConnectionLost(
                "writer task stopped".to_string(),
            )),
            Err(_) => Err(RoomwireError::BackpressureTimeout),
        };

        self.pending.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Queue a text frame.
    pub async fn send_text(&self, text: String) -> Result<()> {
        self.send(OutboundFrame::Text(text)).await
    }

    /// Ask the writer to flush, close the socket and stop.
    pub async fn close(&self) -> Result<()> {
        self.send(OutboundFrame::Close).await
    }

    /// Frames queued but not yet written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer task has stopped.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task for `sink`.
///
/// The task ends cleanly on [`OutboundFrame::Close`] or once every handle is
/// dropped, and with an error if the sink fails.
pub fn spawn_writer_task(
    sink: FrameSink,
    config: WriterConfig,
    stats: Arc<SessionStats>,
) -> (WriterHandle, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
        timeout: config.send_timeout,
    };

    let task = tokio::spawn(writer_loop(rx, sink, pending, stats));

    (handle, task)
}

async fn writer_loop(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut sink: FrameSink,
    pending: Arc<AtomicUsize>,
    stats: Arc<SessionStats>,
) -> Result<()> {
    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            None => {
                let _ = sink.close().await;
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        let closing = write_batch(&mut sink, batch, &stats).await?;
        pending.fetch_sub(batch_size, Ordering::AcqRel);

        if closing {
            tracing::debug!("writer closing socket");
            rx.close();
            sink.close().await?;
            return Ok(());
        }
    }
}

/// Feed a batch to the sink and flush it. Returns `true` if the batch ended
/// with a close request; frames after it are dropped.
async fn write_batch(
    sink: &mut FrameSink,
    batch: Vec<OutboundFrame>,
    stats: &SessionStats,
) -> Result<bool> {
    let mut written = 0;
    let mut closing = false;

    for frame in batch {
        match frame {
            OutboundFrame::Text(text) => {
                sink.feed(text).await?;
                written += 1;
            }
            OutboundFrame::Close => {
                closing = true;
                break;
            }
        }
    }

    if written > 0 {
        sink.flush().await?;
        stats.record_frames_out(written);
    }
    Ok(closing)
}
