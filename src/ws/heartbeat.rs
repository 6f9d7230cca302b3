use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Shortest period accepted; a zero interval from the server is raised to this.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Ticks on the server-advertised heartbeat period.
///
/// A scheduler belongs to a single connection. Dropping it stops all further ticks, so the
/// connection task owns it in a local slot and a new connection starts without one until
/// fresh `Metadata` arrives.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    interval: Interval,
}

impl HeartbeatScheduler {
    /// Starts a scheduler whose first tick is one full `period` from now.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Waits for the next tick of the scheduler in `slot`, or forever if none is running.
    pub async fn tick(slot: &mut Option<Self>) {
        match slot {
            Some(heartbeat) => {
                heartbeat.interval.tick().await;
            }
            None => pending::<()>().await,
        }
    }
}
