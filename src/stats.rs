//! Session diagnostics counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every task of a session.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    replies_resolved: AtomicU64,
    late_replies: AtomicU64,
    decode_errors: AtomicU64,
    pushes_routed: AtomicU64,
    pushes_dropped: AtomicU64,
    handler_failures: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Text frames read from the socket.
    pub frames_in: u64,
    /// Text frames written to the socket.
    pub frames_out: u64,
    /// Replies delivered to a waiting caller.
    pub replies_resolved: u64,
    /// Replies discarded because nobody was waiting any more.
    pub late_replies: u64,
    /// Inbound frames that failed to decode.
    pub decode_errors: u64,
    /// Push events handed to a handler.
    pub pushes_routed: u64,
    /// Push events with no handler (or no capacity).
    pub pushes_dropped: u64,
    /// Handlers that returned an error or panicked.
    pub handler_failures: u64,
    /// Connections re-established after a failure.
    pub reconnects: u64,
}

macro_rules! counter {
    ($incr:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $incr(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl SessionStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_frame_in, frames_in);
    counter!(record_reply_resolved, replies_resolved);
    counter!(record_late_reply, late_replies);
    counter!(record_decode_error, decode_errors);
    counter!(record_push_routed, pushes_routed);
    counter!(record_push_dropped, pushes_dropped);
    counter!(record_handler_failure, handler_failures);
    counter!(record_reconnect, reconnects);

    #[inline]
    pub(crate) fn record_frames_out(&self, n: usize) {
        self.frames_out.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            replies_resolved: self.replies_resolved.load(Ordering::Relaxed),
            late_replies: self.late_replies.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            pushes_routed: self.pushes_routed.load(Ordering::Relaxed),
            pushes_dropped: self.pushes_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
