//! End-to-end reporting with a paused clock and synthetic host readings

use loadprobe::connection::ConnectionCounter;
use loadprobe::host::{HostMetrics, HostResourceSampler, ProcessProbe};
use loadprobe::metrics::types::*;
use loadprobe::metrics::{StatusReporter, TelemetrySink, REPORT_INTERVAL};
use loadprobe::shutdown::{ShutdownAwareTask, ShutdownCoordinator};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Process that burns a quarter of one core on a two-core host
struct SteadyProbe {
    cpu_millis: AtomicU64,
}

impl ProcessProbe for SteadyProbe {
    fn process_cpu_time(&self) -> Option<Duration> {
        // Each sample window reads twice, 500ms apart.
        let millis = self.cpu_millis.fetch_add(250, Ordering::Relaxed);
        Some(Duration::from_millis(millis))
    }

    fn logical_processors(&self) -> usize {
        2
    }

    fn total_resident_memory_kib(&self) -> f64 {
        4096.0
    }
}

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<(String, Properties, MetricValues)>>,
}

impl TelemetrySink for CollectingSink {
    fn record(
        &self,
        event: &str,
        properties: &Properties,
        metrics: &MetricValues,
    ) -> loadprobe::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), properties.clone(), metrics.clone()));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_reports_windows_until_shutdown() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    let counter = Arc::new(ConnectionCounter::new());
    let host = Arc::new(HostMetrics::new());
    let sink = Arc::new(CollectingSink::default());

    let sampler = HostResourceSampler::new(
        Arc::clone(&host),
        Arc::new(SteadyProbe {
            cpu_millis: AtomicU64::new(0),
        }),
    );
    let reporter = StatusReporter::new(
        Arc::clone(&counter),
        Arc::clone(&host),
        Arc::clone(&sink) as Arc<dyn TelemetrySink>,
    )
    .with_log_reports(false);
    let run_id = reporter.run_id().to_string();

    let sampler_task = ShutdownAwareTask::spawn(&coordinator, "sampler", |rx| sampler.run(rx));
    let reporter_task = ShutdownAwareTask::spawn(&coordinator, "reporter", |rx| reporter.run(rx));

    // Nothing connected for two windows: nothing reported.
    tokio::time::sleep(REPORT_INTERVAL * 2 + Duration::from_secs(1)).await;
    assert!(sink.events.lock().unwrap().is_empty());

    // Window 1 (tick at 15s): 5 opened, 1 closed.
    for _ in 0..5 {
        counter.connected();
    }
    counter.disconnected();
    tokio::time::sleep(REPORT_INTERVAL).await;

    // Window 2 (tick at 20s): 3 opened, 1 closed.
    for _ in 0..3 {
        counter.connected();
    }
    counter.disconnected();
    tokio::time::sleep(REPORT_INTERVAL).await;

    coordinator.trigger();
    sampler_task.join(Duration::from_secs(5)).await.unwrap();
    reporter_task.join(Duration::from_secs(5)).await.unwrap();

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);

    for (event, properties, _) in &events {
        assert_eq!(event, STATUS_EVENT);
        assert_eq!(properties[RUN_ID_PROPERTY], run_id);
    }

    let first = &events[0].2;
    assert_eq!(first[ELAPSED], 0.0);
    assert_eq!(first[WINDOW_TOTAL_CONNECTED], 5.0);
    assert_eq!(first[WINDOW_TOTAL_DISCONNECTED], 1.0);
    assert_eq!(first[WINDOW_CURRENT_CONNECTIONS], 4.0);

    let second = &events[1].2;
    assert_eq!(second[ELAPSED], 5000.0);
    assert_eq!(second[TOTAL_CONNECTED], 8.0);
    assert_eq!(second[TOTAL_DISCONNECTED], 2.0);
    assert_eq!(second[WINDOW_TOTAL_CONNECTED], 3.0);
    assert_eq!(second[WINDOW_TOTAL_DISCONNECTED], 1.0);
    assert_eq!(second[WINDOW_CURRENT_CONNECTIONS], 2.0);
    assert_eq!(second[PROCESS_CPU], 25.0);
    assert_eq!(second[HOST_MEMORY_KIB], 4096.0);
}
