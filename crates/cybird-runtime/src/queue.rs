//! Bounded cross-context mailboxes
//!
//! Thin wrapper over a bounded `tokio::sync::mpsc` channel used from plain
//! threads: senders never block indefinitely, receivers drain without
//! waiting.

use std::time::{Duration, Instant};

use cybird_core::{CybirdError, CybirdResult};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Pause between send attempts on a full queue
const BACKOFF_STEP: Duration = Duration::from_millis(1);

/// Create a bounded mailbox pair
pub fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (
        MailboxSender { tx, capacity },
        MailboxReceiver { rx },
    )
}

#[derive(Debug)]
pub struct MailboxSender<T> {
    tx: mpsc::Sender<T>,
    capacity: usize,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        MailboxSender {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> MailboxSender<T> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    /// Enqueue without waiting
    pub fn try_send(&self, msg: T) -> CybirdResult<()> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => CybirdError::QueueFull,
            TrySendError::Closed(_) => CybirdError::QueueClosed,
        })
    }

    /// Enqueue, retrying for at most `max_wait` while the queue is full
    pub fn send_with_backoff(&self, msg: T, max_wait: Duration) -> CybirdResult<()> {
        let deadline = Instant::now() + max_wait;
        let mut msg = msg;
        loop {
            match self.tx.try_send(msg) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(_)) => return Err(CybirdError::QueueClosed),
                Err(TrySendError::Full(back)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(CybirdError::QueueFull);
                    }
                    std::thread::sleep(BACKOFF_STEP.min(deadline - now));
                    msg = back;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct MailboxReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> MailboxReceiver<T> {
    /// Next message, if one is waiting
    pub fn try_recv(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Up to `max` waiting messages
    pub fn drain(&mut self, max: usize) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_and_capacity() {
        let (tx, mut rx) = mailbox::<u32>(2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(matches!(tx.try_send(3), Err(CybirdError::QueueFull)));
        assert_eq!(rx.drain(10), vec![1, 2]);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_backoff_gives_up() {
        let (tx, _rx) = mailbox::<u32>(1);
        tx.try_send(1).unwrap();

        let started = Instant::now();
        let err = tx.send_with_backoff(2, Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, CybirdError::QueueFull));
        assert!(err.is_contention());
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_backoff_succeeds_once_drained() {
        let (tx, mut rx) = mailbox::<u32>(1);
        tx.try_send(1).unwrap();

        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            let first = rx.try_recv();
            std::thread::sleep(Duration::from_millis(20));
            (first, rx.try_recv())
        });

        tx.send_with_backoff(2, Duration::from_millis(500)).unwrap();
        let (first, second) = consumer.join().unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[test]
    fn test_closed_queue() {
        let (tx, rx) = mailbox::<u32>(4);
        drop(rx);
        assert!(matches!(
            tx.send_with_backoff(1, Duration::from_millis(50)),
            Err(CybirdError::QueueClosed)
        ));
    }
}
