//! Host Resource Sampler
//!
//! Once per [`SAMPLE_INTERVAL`] measures process CPU over
//! [`CPU_SAMPLE_WINDOW`] and the host-wide resident memory total, then
//! publishes both into [`HostMetrics`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::metrics::{HostMetrics, HostSnapshot};
use super::probe::ProcessProbe;
use crate::shutdown::{shutdown_requested, sleep_or_shutdown};

/// Pause between samples
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Window over which process CPU time is measured
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

/// Process CPU utilisation over a window, in percent of all logical processors.
///
/// Not clamped: clock skew can push the result slightly past 100.
pub fn cpu_percent(cpu_delta: Duration, wall_delta: Duration, logical_processors: usize) -> f64 {
    let capacity = logical_processors.max(1) as f64 * wall_delta.as_secs_f64();
    if capacity <= 0.0 {
        return 0.0;
    }
    100.0 * cpu_delta.as_secs_f64() / capacity
}

/// Periodic sampler feeding a shared [`HostMetrics`]
pub struct HostResourceSampler {
    metrics: Arc<HostMetrics>,
    probe: Arc<dyn ProcessProbe>,
}

impl HostResourceSampler {
    pub fn new(metrics: Arc<HostMetrics>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self { metrics, probe }
    }

    /// Take one full sample.
    ///
    /// Returns `None` when process CPU time could not be read at either end
    /// of the window.
    pub async fn sample(&self) -> Option<HostSnapshot> {
        let Some(cpu_start) = self.probe.process_cpu_time() else {
            warn!("Process CPU time unavailable, skipping sample");
            return None;
        };
        let wall_start = Instant::now();

        tokio::time::sleep(CPU_SAMPLE_WINDOW).await;

        let Some(cpu_end) = self.probe.process_cpu_time() else {
            warn!("Process CPU time unavailable after sample window, skipping sample");
            return None;
        };
        let wall_delta = wall_start.elapsed();

        let process_cpu_percent = cpu_percent(
            cpu_end.saturating_sub(cpu_start),
            wall_delta,
            self.probe.logical_processors(),
        );
        let host_memory_kib = self.probe.total_resident_memory_kib();

        Some(HostSnapshot {
            process_cpu_percent,
            host_memory_kib,
        })
    }

    /// Sample until shutdown.
    ///
    /// A measurement that is already under way always completes and is
    /// published before the loop exits.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval = ?SAMPLE_INTERVAL,
            window = ?CPU_SAMPLE_WINDOW,
            "Host resource sampler started"
        );

        loop {
            if shutdown_requested(&mut shutdown_rx) {
                break;
            }

            if let Some(snapshot) = self.sample().await {
                debug!(
                    process_cpu = snapshot.process_cpu_percent,
                    host_memory_kib = snapshot.host_memory_kib,
                    "Host sample published"
                );
                self.metrics.publish(snapshot);
            }

            if sleep_or_shutdown(SAMPLE_INTERVAL, &mut shutdown_rx).await {
                break;
            }
        }

        info!("Host resource sampler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Replays scripted CPU readings
    struct ScriptedProbe {
        cpu_times: Mutex<VecDeque<Option<Duration>>>,
        processors: usize,
        memory_kib: f64,
    }

    impl ScriptedProbe {
        fn new(cpu_times: Vec<Option<Duration>>, processors: usize, memory_kib: f64) -> Self {
            Self {
                cpu_times: Mutex::new(cpu_times.into()),
                processors,
                memory_kib,
            }
        }
    }

    impl ProcessProbe for ScriptedProbe {
        fn process_cpu_time(&self) -> Option<Duration> {
            self.cpu_times.lock().unwrap().pop_front().flatten()
        }

        fn logical_processors(&self) -> usize {
            self.processors
        }

        fn total_resident_memory_kib(&self) -> f64 {
            self.memory_kib
        }
    }

    #[test]
    fn test_cpu_percent_formula() {
        let percent = cpu_percent(
            Duration::from_millis(1500) - Duration::from_millis(1000),
            Duration::from_millis(500),
            1,
        );
        assert_eq!(percent, 100.0);

        let percent = cpu_percent(Duration::from_millis(500), Duration::from_millis(500), 4);
        assert_eq!(percent, 25.0);
    }

    #[test]
    fn test_cpu_percent_zero_wall_time() {
        assert_eq!(cpu_percent(Duration::from_millis(10), Duration::ZERO, 2), 0.0);
    }

    #[test]
    fn test_cpu_percent_not_clamped() {
        let percent = cpu_percent(Duration::from_millis(600), Duration::from_millis(500), 1);
        assert!(percent > 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_uses_window_readings() {
        let probe = ScriptedProbe::new(
            vec![
                Some(Duration::from_millis(1000)),
                Some(Duration::from_millis(1500)),
            ],
            1,
            2048.0,
        );
        let sampler = HostResourceSampler::new(Arc::new(HostMetrics::new()), Arc::new(probe));

        let snapshot = sampler.sample().await.unwrap();
        assert_eq!(snapshot.process_cpu_percent, 100.0);
        assert_eq!(snapshot.host_memory_kib, 2048.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_skipped_when_cpu_unreadable() {
        let probe = ScriptedProbe::new(vec![Some(Duration::from_millis(10)), None], 1, 1.0);
        let sampler = HostResourceSampler::new(Arc::new(HostMetrics::new()), Arc::new(probe));

        assert!(sampler.sample().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_and_survives_failed_sample() {
        let metrics = Arc::new(HostMetrics::new());
        let probe = ScriptedProbe::new(
            vec![
                None,
                Some(Duration::from_millis(0)),
                Some(Duration::from_millis(250)),
            ],
            2,
            512.0,
        );
        let sampler = HostResourceSampler::new(Arc::clone(&metrics), Arc::new(probe));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampler.run(shutdown_rx));

        // First tick fails immediately, second spans 1s pause + 0.5s window.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.process_cpu_percent, 25.0);
        assert_eq!(snapshot.host_memory_kib, 512.0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_window_completes_measurement() {
        let metrics = Arc::new(HostMetrics::new());
        let probe = ScriptedProbe::new(
            vec![Some(Duration::ZERO), Some(Duration::from_millis(500))],
            1,
            64.0,
        );
        let sampler = HostResourceSampler::new(Arc::clone(&metrics), Arc::new(probe));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(metrics.snapshot().process_cpu_percent, 100.0);
        assert_eq!(metrics.snapshot().host_memory_kib, 64.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_within_one_interval_of_shutdown() {
        let metrics = Arc::new(HostMetrics::new());
        let probe = ScriptedProbe::new(
            vec![Some(Duration::ZERO), Some(Duration::from_millis(250))],
            1,
            128.0,
        );
        let sampler = HostResourceSampler::new(Arc::clone(&metrics), Arc::new(probe));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampler.run(shutdown_rx));

        // The window ends at 0.5s; the pause that follows runs until 1.5s.
        tokio::time::sleep(Duration::from_millis(800)).await;
        shutdown_tx.send(()).unwrap();

        let started = Instant::now();
        tokio::time::timeout(SAMPLE_INTERVAL, handle)
            .await
            .expect("sampler kept running after shutdown")
            .unwrap();
        assert!(started.elapsed() < SAMPLE_INTERVAL);
        assert_eq!(metrics.snapshot().process_cpu_percent, 50.0);
    }
}
