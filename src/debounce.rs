use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds back values until no new one has arrived for `delay`, then emits the
/// latest on the receiver returned by [`Debouncer::new`].
///
/// Must be used from within a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            rx,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, value: T) {
        self.cancel();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(value);
        }));
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drops the value waiting to be emitted, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Instant};

    #[tokio::test(start_paused = true)]
    async fn emits_only_the_latest_value_after_quiet_period() {
        let (mut debouncer, mut rx) = Debouncer::new(DEFAULT_SEARCH_DEBOUNCE);
        let started = Instant::now();

        debouncer.push("j".to_string());
        advance(Duration::from_millis(100)).await;
        debouncer.push("ja".to_string());
        advance(Duration::from_millis(100)).await;
        debouncer.push("jazz".to_string());

        let value = rx.recv().await;
        assert_eq!(value.as_deref(), Some("jazz"));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn separate_pauses_emit_separately() {
        let (mut debouncer, mut rx) = Debouncer::new(Duration::from_millis(300));

        debouncer.push(1);
        assert_eq!(rx.recv().await, Some(1));
        debouncer.push(2);
        assert!(debouncer.is_pending());
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_value() {
        let (mut debouncer, mut rx) = Debouncer::new(Duration::from_millis(300));
        debouncer.push("rock");
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_mid_delay_never_emits() {
        let (mut debouncer, mut rx) = Debouncer::new(Duration::from_millis(300));
        debouncer.push("rock");
        drop(debouncer);

        assert_eq!(rx.recv().await, None);
    }
}
