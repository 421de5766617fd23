//! consumer.rs
//!
//! Replay-then-subscribe consumption of the record log.
//!
//! The live listener is registered before the history read starts, so a
//! record appended while history is being drained lands in the live buffer
//! instead of falling between the two. Records are delivered at most once per
//! id: history first, in log order, then live appends in arrival order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tally_common::{Record, RecordId};
use tally_peer::PeerNode;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct RecordStreamConsumer<P: PeerNode> {
    peer: Arc<P>,
    subscribed: AtomicBool,
}

/// Running consumption loop.
pub struct ConsumerHandle {
    task: JoinHandle<()>,
    replayed: Option<oneshot::Receiver<usize>>,
}

impl ConsumerHandle {
    /// Resolves once history has been drained, with the number of historical
    /// records delivered. Only the first call waits; later calls return
    /// `None`.
    pub async fn history_replayed(&mut self) -> Option<usize> {
        self.replayed.take()?.await.ok()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

impl<P: PeerNode> RecordStreamConsumer<P> {
    pub fn new(peer: Arc<P>) -> Self {
        Self {
            peer,
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Starts delivering records to `on_record`. Only the first call does
    /// anything; later calls return `None`.
    pub fn consume<F>(&self, mut on_record: F) -> Option<ConsumerHandle>
    where
        F: FnMut(Record) + Send + 'static,
    {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            debug!("record stream already consumed, ignoring");
            return None;
        }

        let mut live = self.peer.subscribe_records();
        let mut history = self.peer.records();
        let (replayed_tx, replayed_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            // Grows with the log; replication keeps that bounded at newest-N per domain.
            let mut seen: HashSet<RecordId> = HashSet::new();

            let mut replayed = 0usize;
            while let Some(record) = history.next().await {
                if !seen.insert(record.id.clone()) {
                    warn!(id = %record.id, "history repeated a record id, skipping");
                    continue;
                }
                on_record(record);
                replayed += 1;
            }
            info!(replayed, "📜 history replay complete, switching to live records");
            let _ = replayed_tx.send(replayed);

            while let Some(record) = live.recv().await {
                if !seen.insert(record.id.clone()) {
                    debug!(id = %record.id, "already delivered, skipping");
                    continue;
                }
                on_record(record);
            }
            warn!("live record feed closed");
        });

        Some(ConsumerHandle {
            task,
            replayed: Some(replayed_rx),
        })
    }
}
