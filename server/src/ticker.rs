//! Periodic score tick driver

use crate::network::ServerMessage;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Sends [`ServerMessage::Tick`] to the server task once per period.
///
/// The first tick fires one full period after spawning. Missed ticks are
/// skipped rather than bunched up, so a stalled server never awards a burst
/// of points. Dropping the ticker stops it.
pub struct ScoreTicker {
    handle: JoinHandle<()>,
    period: Duration,
}

impl ScoreTicker {
    pub fn spawn(period: Duration, server_tx: mpsc::Sender<ServerMessage>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                if server_tx.send(ServerMessage::Tick).await.is_err() {
                    debug!("Server gone, stopping score ticker");
                    break;
                }
            }
        });

        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ScoreTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
