//! Playback timer.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::session::SessionEvent;

/// Single interval task that posts playback ticks to a session.
///
/// Starting the timer aborts the previous task, so at most one is running.
/// Each start bumps the epoch; ticks carry it so ones queued by an earlier
/// run can be told apart.
#[derive(Debug, Default)]
pub struct PlaybackTimer {
    task: Option<JoinHandle<()>>,
    epoch: u64,
}

impl PlaybackTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start ticking every `speed_ms` milliseconds.
    pub fn start(&mut self, speed_ms: u64, generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) {
        self.stop();
        self.epoch += 1;
        let epoch = self.epoch;
        let period = Duration::from_millis(speed_ms.max(1));
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(SessionEvent::PlaybackTick { generation, epoch }).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PlaybackTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_speed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = PlaybackTimer::new();
        timer.start(500, 7, tx);
        assert!(timer.is_running());

        let start = tokio::time::Instant::now();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::PlaybackTick { generation: 7, epoch: 1 }));
        assert_eq!(start.elapsed(), Duration::from_millis(500));

        timer.stop();
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = PlaybackTimer::new();
        timer.start(1000, 1, tx.clone());
        timer.start(1000, 2, tx);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::PlaybackTick { generation: 2, epoch: 2 }));
    }
}
