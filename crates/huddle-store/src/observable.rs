//! Latest-value publish/subscribe cell.
//!
//! Every store publishes its state through [`Observable`]s. A subscriber sees
//! the current value immediately and is woken on each later change; values
//! published while it wasn't looking are coalesced into the latest one.

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::watch;

#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify subscribers. Works with zero subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the value in place and notify subscribers.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Receiver that starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Stream yielding the current value, then the latest value after each
    /// change. Ends when the observable is dropped.
    pub fn updates(&self) -> impl Stream<Item = T> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let current = rx.borrow_and_update().clone();

        let changes = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = rx.borrow_and_update().clone();
            Some((value, rx))
        });

        stream::once(async move { current }).chain(changes)
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
