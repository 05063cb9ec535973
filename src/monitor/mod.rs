//! Background polling of the status API.
//!
//! The [`PollScheduler`] owns the auto-refresh timer. Each tick runs one
//! [`RefreshSource::refresh`] cycle against a snapshot of the current
//! [`CycleInputs`] and sends the resulting [`CycleReport`] to the UI task,
//! which applies it in one step. Cycles from the timer never overlap;
//! manual refreshes may interleave with them.

pub mod cycle;

pub use cycle::{CycleInputs, CycleReport, RefreshSource, Refresher};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::state::{MAX_POLL_SECONDS, MIN_POLL_SECONDS};

/// Drives refresh cycles on a timer or on demand.
pub struct PollScheduler<S: RefreshSource> {
    source: Arc<S>,
    inputs: watch::Receiver<CycleInputs>,
    reports: mpsc::UnboundedSender<CycleReport>,
    /// Cancels the running timer task, if any.
    timer: Option<CancellationToken>,
    period: Option<Duration>,
}

impl<S: RefreshSource> PollScheduler<S> {
    pub fn new(
        source: S,
        inputs: watch::Receiver<CycleInputs>,
        reports: mpsc::UnboundedSender<CycleReport>,
    ) -> Self {
        Self {
            source: Arc::new(source),
            inputs,
            reports,
            timer: None,
            period: None,
        }
    }

    /// Replaces the timer. When `enabled`, a cycle runs right away and then
    /// every `seconds` (clamped to 1..=30). Disabling stops future cycles; a
    /// cycle already in flight still delivers its report.
    pub fn set_interval(&mut self, seconds: u64, enabled: bool) {
        self.stop();
        if !enabled {
            info!("auto refresh disabled");
            return;
        }

        let period = Duration::from_secs(seconds.clamp(MIN_POLL_SECONDS, MAX_POLL_SECONDS));
        let token = CancellationToken::new();
        self.timer = Some(token.clone());
        self.period = Some(period);
        info!(?period, "auto refresh enabled");

        let source = Arc::clone(&self.source);
        let inputs = self.inputs.clone();
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let snapshot = inputs.borrow().clone();
                let report = source.refresh(snapshot).await;
                if reports.send(report).is_err() {
                    break;
                }
            }
            debug!("poll timer stopped");
        });
    }

    /// Runs one cycle now, independent of the timer.
    pub fn refresh_now(&self) {
        let source = Arc::clone(&self.source);
        let snapshot = self.inputs.borrow().clone();
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let report = source.refresh(snapshot).await;
            let _ = reports.send(report);
        });
    }

    /// Current timer period, `None` when auto refresh is off.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.is_some()
    }

    fn stop(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
        self.period = None;
    }
}

impl<S: RefreshSource> Drop for PollScheduler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RefreshSource for CountingSource {
        async fn refresh(&self, _inputs: CycleInputs) -> CycleReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CycleReport::default()
        }
    }

    fn scheduler() -> (
        PollScheduler<CountingSource>,
        Arc<AtomicUsize>,
        watch::Sender<CycleInputs>,
        mpsc::UnboundedReceiver<CycleReport>,
    ) {
        let source = CountingSource::default();
        let calls = Arc::clone(&source.calls);
        let (inputs_tx, inputs_rx) = watch::channel(CycleInputs::default());
        let (tx, rx) = mpsc::unbounded_channel();
        (PollScheduler::new(source, inputs_rx, tx), calls, inputs_tx, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn disable_after_one_cycle_stops_updates() {
        let (mut scheduler, calls, _inputs, mut rx) = scheduler();

        scheduler.set_interval(3, true);
        assert!(rx.recv().await.is_some());
        scheduler.set_interval(3, false);
        assert!(!scheduler.is_enabled());

        time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_follow_the_clamped_period() {
        let (mut scheduler, calls, _inputs, mut rx) = scheduler();

        scheduler.set_interval(120, true);
        assert_eq!(scheduler.period(), Some(Duration::from_secs(30)));

        let start = time::Instant::now();
        rx.recv().await;
        rx.recv().await;
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn re_enabling_replaces_the_timer() {
        let (mut scheduler, calls, _inputs, mut rx) = scheduler();

        scheduler.set_interval(5, true);
        rx.recv().await;
        scheduler.set_interval(1, true);
        rx.recv().await;

        time::sleep(Duration::from_millis(2500)).await;
        while rx.try_recv().is_ok() {}
        // One immediate cycle per enable plus two ticks of the 1s timer.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn refresh_now_runs_once_without_a_timer() {
        let (scheduler, calls, _inputs, mut rx) = scheduler();
        scheduler.refresh_now();
        assert!(rx.recv().await.is_some());
        assert!(!scheduler.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
