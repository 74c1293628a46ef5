//! Heartbeat interval and one-shot deadlines
//!
//! Both timers are owned by the coordinator task and polled from its
//! `select!` loop. A stopped timer is a future that never completes, so the
//! loop needs no per-timer guards.

use std::pin::Pin;
use std::time::Duration;

use futures::future;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

/// Periodic tick driving MAIN's heartbeat broadcast
#[derive(Debug, Default)]
pub struct Ticker {
    interval: Option<Interval>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start ticking; the first tick is one full period from now
    pub fn start(&mut self, period: Duration) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => future::pending().await,
        }
    }
}

/// Cancellable one-shot timer, used for the liveness watchdog and the
/// startup grace window
#[derive(Debug, Default)]
pub struct Deadline {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm to fire `after` from now, replacing any pending expiry
    pub fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(time::sleep(after)));
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Completes once when the armed deadline passes, then disarms
    pub async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => future::pending().await,
        }
    }
}
