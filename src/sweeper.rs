//! Background eviction of abandoned rooms

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::SessionCoordinator;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periodically evict rooms that stayed empty past the grace period
///
/// Runs until the returned task is aborted. A zero period is raised to one
/// millisecond.
pub fn spawn_sweeper(coordinator: Arc<SessionCoordinator>, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut tick = time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Room sweeper started (every {:?})", every);

        loop {
            tick.tick().await;
            let evicted = coordinator.sweep_expired(Instant::now()).await;
            if !evicted.is_empty() {
                debug!("Sweep evicted {} room(s)", evicted.len());
            }
        }
    })
}
