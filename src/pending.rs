//! Correlation table for outstanding requests.
//!
//! Every request that expects a reply gets a pending entry keyed by its
//! [`RequestId`]. The entry holds the sending half of a oneshot channel, so it
//! can be resolved at most once: whoever removes it from the map first
//! (reply, timeout, sweep or disconnect) is the one that delivers the outcome.
//!
//! ```text
//! send() ──register──► ┌──────────────────────────┐ ◄──resolve── read loop
//!                      │ HashMap<rid, PendingEntry> │ ◄──fail_all── supervisor
//! waiter ◄──oneshot─── └──────────────────────────┘ ◄──sweep──── keepalive tick
//! ```
//!
//! Dropping a [`ResponseWaiter`] removes its entry, so a caller that stops
//! waiting (timeout, cancellation, task abort) never leaves a dangling entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Result, RoomwireError, ServerError};
use crate::protocol::RequestId;

/// How an outstanding request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The server replied successfully.
    Success(Value),
    /// The server replied with an error for this request.
    Error(ServerError),
    /// No reply within the request's timeout.
    Timeout,
    /// The connection went away first.
    ConnectionLost(String),
}

impl Outcome {
    /// Convert into the caller-facing result.
    pub fn into_result(self, rid: &RequestId, timeout: Duration) -> Result<Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Error(error) => Err(RoomwireError::Request(error)),
            Outcome::Timeout => Err(RoomwireError::Timeout {
                rid: rid.to_string(),
                after: timeout,
            }),
            Outcome::ConnectionLost(reason) => Err(RoomwireError::ConnectionLost(reason)),
        }
    }
}

/// Bookkeeping for one outstanding request.
#[derive(Debug)]
struct PendingEntry {
    tx: oneshot::Sender<Outcome>,
    created: Instant,
    timeout: Duration,
}

/// Map of outstanding requests, shared by all callers of one session.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<RequestId, PendingEntry>>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending entry and return a handle to wait on.
    ///
    /// Fails if `rid` is already pending.
    pub fn register(
        self: &Arc<Self>,
        rid: RequestId,
        timeout: Duration,
    ) -> Result<ResponseWaiter> {
        let (tx, rx) = oneshot::channel();
        {
            let mut entries = self.entries.lock();
            if entries.contains_key(&rid) {
                return Err(RoomwireError::DuplicateRequestId(rid.to_string()));
            }
            entries.insert(
                rid.clone(),
                PendingEntry {
                    tx,
                    created: Instant::now(),
                    timeout,
                },
            );
            tracing::trace!(%rid, pending = entries.len(), "registered pending request");
        }

        Ok(ResponseWaiter {
            rid,
            rx,
            table: self.clone(),
        })
    }

    /// Deliver `outcome` to the waiter for `rid` and drop its entry.
    ///
    /// Returns `false` (and does nothing else) when `rid` is not pending,
    /// which is the case for duplicate replies and replies that lost the race
    /// against a timeout.
    pub fn resolve(&self, rid: &RequestId, outcome: Outcome) -> bool {
        let entry = self.entries.lock().remove(rid);
        match entry {
            Some(entry) => {
                // The waiter may have been dropped between removal and send.
                let _ = entry.tx.send(outcome);
                true
            }
            None => {
                tracing::debug!(%rid, "discarding reply for unknown request id");
                false
            }
        }
    }

    /// Resolve every pending entry with [`Outcome::ConnectionLost`].
    ///
    /// Returns the number of entries failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<(RequestId, PendingEntry)> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (rid, entry) in drained {
            tracing::debug!(%rid, reason, "failing pending request");
            let _ = entry.tx.send(Outcome::ConnectionLost(reason.to_string()));
        }
        count
    }

    /// Resolve every entry older than its own timeout with [`Outcome::Timeout`].
    ///
    /// Returns the number of entries expired.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let expired: Vec<(RequestId, PendingEntry)> = {
            let mut entries = self.entries.lock();
            let rids: Vec<RequestId> = entries
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.created) >= e.timeout)
                .map(|(rid, _)| rid.clone())
                .collect();
            rids.into_iter()
                .filter_map(|rid| entries.remove(&rid).map(|e| (rid, e)))
                .collect()
        };

        let count = expired.len();
        for (rid, entry) in expired {
            tracing::debug!(%rid, timeout = ?entry.timeout, "sweeping expired request");
            let _ = entry.tx.send(Outcome::Timeout);
        }
        count
    }

    /// Drop the entry for `rid` without resolving it.
    pub fn remove(&self, rid: &RequestId) -> bool {
        self.entries.lock().remove(rid).is_some()
    }

    /// Whether `rid` is currently pending.
    #[cfg(test)]
    pub fn contains(&self, rid: &RequestId) -> bool {
        self.entries.lock().contains_key(rid)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no request is pending.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Handle held by the caller of a request until its outcome arrives.
///
/// Dropping the waiter removes the pending entry if it is still present.
#[derive(Debug)]
pub struct ResponseWaiter {
    rid: RequestId,
    rx: oneshot::Receiver<Outcome>,
    table: Arc<CorrelationTable>,
}

impl ResponseWaiter {
    /// Wait for the outcome.
    pub async fn wait(&mut self) -> Outcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            // Entry removed without an outcome.
            Err(_) => Outcome::ConnectionLost("pending entry dropped".to_string()),
        }
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        if self.table.remove(&self.rid) {
            tracing::trace!(rid = %self.rid, "waiter dropped before resolution");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Arc<CorrelationTable> {
        Arc::new(CorrelationTable::new())
    }

    const T: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = table();
        let mut waiter = table.register(RequestId::from("1"), T).unwrap();
        assert!(table.contains(&RequestId::from("1")));

        assert!(table.resolve(&RequestId::from("1"), Outcome::Success(json!({"ok": true}))));
        assert_eq!(waiter.wait().await, Outcome::Success(json!({"ok": true})));
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_register_fails() {
        let table = table();
        let _w = table.register(RequestId::from("1"), T).unwrap();
        let err = table.register(RequestId::from("1"), T).unwrap_err();
        assert!(matches!(err, RoomwireError::DuplicateRequestId(id) if id == "1"));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_twice_is_noop() {
        let table = table();
        let mut waiter = table.register(RequestId::from("1"), T).unwrap();

        assert!(table.resolve(&RequestId::from("1"), Outcome::Success(json!(1))));
        assert!(!table.resolve(&RequestId::from("1"), Outcome::Success(json!(2))));

        assert_eq!(waiter.wait().await, Outcome::Success(json!(1)));
    }

    #[test]
    fn test_resolve_unknown_is_noop() {
        let table = table();
        assert!(!table.resolve(&RequestId::from("404"), Outcome::Timeout));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_fail_all() {
        let table = table();
        let mut waiters: Vec<_> = (0..5)
            .map(|i| table.register(RequestId::new(i.to_string()), T).unwrap())
            .collect();

        assert_eq!(table.fail_all("socket closed"), 5);
        assert!(table.is_empty());

        for w in waiters.iter_mut() {
            assert_eq!(
                w.wait().await,
                Outcome::ConnectionLost("socket closed".to_string())
            );
        }
        assert_eq!(table.fail_all("again"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let table = table();
        let mut short = table
            .register(RequestId::from("short"), Duration::from_millis(100))
            .unwrap();
        let _long = table
            .register(RequestId::from("long"), Duration::from_secs(60))
            .unwrap();

        assert_eq!(table.sweep_expired(Instant::now()), 0);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(table.sweep_expired(Instant::now()), 1);

        assert_eq!(short.wait().await, Outcome::Timeout);
        assert!(table.contains(&RequestId::from("long")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_drop_waiter_removes_entry() {
        let table = table();
        let waiter = table.register(RequestId::from("1"), T).unwrap();
        assert_eq!(table.len(), 1);
        drop(waiter);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_register_resolve() {
        let table = table();
        let mut tasks = Vec::new();
        for i in 0..100u32 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move {
                let rid = RequestId::new(i.to_string());
                let mut waiter = table.register(rid.clone(), T).unwrap();
                let resolver = table.clone();
                tokio::spawn(async move {
                    resolver.resolve(&rid, Outcome::Success(json!(i)));
                });
                waiter.wait().await
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), Outcome::Success(json!(i)));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_outcome_into_result() {
        let rid = RequestId::from("3");
        assert_eq!(
            Outcome::Success(json!(null)).into_result(&rid, T).unwrap(),
            json!(null)
        );
        assert!(matches!(
            Outcome::Error(ServerError::new("x")).into_result(&rid, T),
            Err(RoomwireError::Request(_))
        ));
        assert!(Outcome::Timeout.into_result(&rid, T).unwrap_err().is_timeout());
        assert!(Outcome::ConnectionLost("gone".into())
            .into_result(&rid, T)
            .unwrap_err()
            .is_connection_lost());
    }
}
