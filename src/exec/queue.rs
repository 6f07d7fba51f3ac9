// src/exec/queue.rs

//! FIFO channel shared between a job's bridge tasks.
//!
//! Any number of producers may `push`; any number of consumers may `pop`
//! (consumers take turns on the receiver). The queue also tracks how many
//! items are still waiting so that a writer can block until everything it
//! enqueued has been picked up.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify, mpsc};

#[derive(Debug)]
pub struct ChunkQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
    pending: AtomicUsize,
    drained: Notify,
}

impl<T> ChunkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Append an item. Never blocks.
    pub fn push(&self, item: T) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        // The queue owns the receiver, so the channel cannot be closed.
        if self.tx.send(item).is_err() {
            self.taken();
        }
    }

    /// Wait for the next item.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn pop(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        let item = rx.recv().await;
        if item.is_some() {
            self.taken();
        }
        item
    }

    /// Take the next item if one is ready and no other consumer is waiting.
    pub fn try_pop(&self) -> Option<T> {
        let mut rx = self.rx.try_lock().ok()?;
        let item = rx.try_recv().ok();
        if item.is_some() {
            self.taken();
        }
        item
    }

    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve once every pushed item has been popped.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn taken(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

impl<T> Default for ChunkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
