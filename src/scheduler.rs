//! Pacing capabilities: when a deferred reply may land, and what time it is.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

pub type Delay = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Produces the wait a pending reply sits in before it is appended.
///
/// `sleep` is called synchronously at submit time, so implementations see
/// requests in submission order.
pub trait Scheduler: Send + Sync {
    fn sleep(&self, delay: Duration) -> Delay;
}

/// Wall-clock pacing on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn sleep(&self, delay: Duration) -> Delay {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Test scheduler: every sleep blocks until released by index, so replies can
/// be resolved in any chosen order without real time passing.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    waiting: Mutex<Vec<(Duration, Option<oneshot::Sender<()>>)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sleeps requested so far.
    pub fn scheduled(&self) -> usize {
        self.lock().len()
    }

    /// Delay requested by the `n`-th sleep.
    pub fn requested(&self, n: usize) -> Option<Duration> {
        self.lock().get(n).map(|(d, _)| *d)
    }

    /// Wake the `n`-th sleep. Returns false if unknown or already released.
    pub fn release(&self, n: usize) -> bool {
        let tx = self.lock().get_mut(n).and_then(|(_, tx)| tx.take());
        match tx {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn release_all(&self) {
        let mut waiting = self.lock();
        for (_, tx) in waiting.iter_mut() {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Duration, Option<oneshot::Sender<()>>)>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn sleep(&self, delay: Duration) -> Delay {
        let (tx, rx) = oneshot::channel();
        self.lock().push((delay, Some(tx)));
        Box::pin(async move {
            let _ = rx.await;
        })
    }
}

/// Timestamp source for message creation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
