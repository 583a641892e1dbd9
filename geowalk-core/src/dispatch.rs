//! Single-threaded dispatch context
//!
//! Worker threads never touch session state. They post events through a
//! `DispatchHandle`; the owning thread drains the queue and applies them.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub struct Dispatcher<E> {
    tx: Sender<E>,
    rx: Receiver<E>,
}

/// Posting side of a dispatcher, safe to move into worker threads
pub struct DispatchHandle<E> {
    tx: Sender<E>,
}

impl<E> Clone for DispatchHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> DispatchHandle<E> {
    /// Queue an event. Returns false once the dispatcher is gone.
    pub fn post(&self, event: E) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl<E> Dispatcher<E> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> DispatchHandle<E> {
        DispatchHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn try_next(&self) -> Option<E> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            // We hold a sender ourselves, so this cannot happen
            Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<E> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_post_order() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        assert!(handle.post(1));
        assert!(handle.post(2));

        assert_eq!(dispatcher.try_next(), Some(1));
        assert_eq!(dispatcher.try_next(), Some(2));
        assert_eq!(dispatcher.try_next(), None);
    }

    #[test]
    fn test_post_from_worker_thread() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();

        std::thread::spawn(move || {
            handle.post("done");
        });

        assert_eq!(
            dispatcher.next_timeout(Duration::from_secs(5)),
            Some("done")
        );
    }

    #[test]
    fn test_post_after_drop_fails() {
        let dispatcher: Dispatcher<u8> = Dispatcher::new();
        let handle = dispatcher.handle();
        drop(dispatcher);
        assert!(!handle.post(7));
    }

    #[test]
    fn test_next_timeout_expires() {
        let dispatcher: Dispatcher<u8> = Dispatcher::new();
        assert_eq!(dispatcher.next_timeout(Duration::from_millis(10)), None);
    }
}
