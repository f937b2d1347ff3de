//! The two periodic collection loops.
//!
//! The system loop samples local resources on a fixed interval. The
//! component loop keeps a due time per component and spawns a probe as soon
//! as one is due, with at most one probe in flight per component and a
//! shared semaphore bounding the total. A component is rescheduled from its
//! own completion, so a slow peer never delays it. Both loops skip ticks
//! they could not make in time instead of queueing them.
//!
//! Shutdown is driven by a [`LoopSignal`] channel: `Drain` stops new probes
//! and lets in-flight ones finish, `Abort` resolves any probe still
//! running as [`ProbeFailure::Cancelled`].

use crate::{
    config::Config,
    evaluator::{evaluate_probe, evaluate_system},
    metrics::SystemSampler,
    model::{ComponentHealth, MetadataValue, ProbeThresholds, RegisteredComponent},
    probe::{ProbeClient, ProbeFailure, ProbeResult},
    store::{HealthStore, ProbeStamp, ScheduledComponent},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{watch, Semaphore},
    task::{AbortHandle, JoinHandle, JoinSet},
    time::{interval, sleep_until, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

/// Run state broadcast from the service to both loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Run,
    /// Let in-flight probes finish, start no new ones, then exit
    Drain,
    /// Cancel in-flight probes now
    Abort,
}

/// Join handles of the two spawned loops
pub struct SchedulerHandles {
    pub system: JoinHandle<()>,
    pub components: JoinHandle<()>,
}

pub struct CollectionScheduler {
    config: Arc<Config>,
    store: Arc<HealthStore>,
    client: ProbeClient,
    sampler: Arc<Mutex<SystemSampler>>,
    signal: watch::Receiver<LoopSignal>,
}

impl CollectionScheduler {
    pub fn new(
        config: Arc<Config>,
        store: Arc<HealthStore>,
        client: ProbeClient,
        sampler: SystemSampler,
        signal: watch::Receiver<LoopSignal>,
    ) -> Self {
        Self {
            config,
            store,
            client,
            sampler: Arc::new(Mutex::new(sampler)),
            signal,
        }
    }

    /// Launch both loops on the current runtime.
    pub fn spawn(self) -> SchedulerHandles {
        let scheduler = Arc::new(self);
        let system = tokio::spawn(Arc::clone(&scheduler).run_system_loop());
        let components = tokio::spawn(scheduler.run_component_loop());
        SchedulerHandles { system, components }
    }

    async fn run_system_loop(self: Arc<Self>) {
        let mut signal = self.signal.clone();
        let mut ticker = interval(self.config.system_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.config.system_interval_ms, "System loop started");

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut signal) => break,
                _ = ticker.tick() => self.sample_system().await,
            }
        }

        info!("System loop stopped");
    }

    /// One system tick: sample, classify, store.
    pub async fn sample_system(&self) {
        let sampler = Arc::clone(&self.sampler);
        let sample = match tokio::task::spawn_blocking(move || sampler.lock().sample()).await {
            Ok(sample) => sample,
            Err(e) => {
                error!(error = %e, "System sampling task failed");
                return;
            }
        };

        let health = evaluate_system(&sample, &self.config.system_thresholds);
        if !health.unavailable.is_empty() {
            debug!(unavailable = ?health.unavailable, "Some system metrics are unavailable");
        }
        debug!(status = %health.status, "System sample recorded");

        self.store.record_system_sample(sample, health);
    }

    async fn run_component_loop(self: Arc<Self>) {
        let mut signal = self.signal.clone();
        let default_interval = self.config.component_interval();
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        // Next due time per idle component; in-flight ids have no entry
        let mut schedule: HashMap<String, Instant> = HashMap::new();
        let mut in_flight: HashMap<String, AbortHandle> = HashMap::new();
        let mut tasks: JoinSet<(String, Instant, Duration)> = JoinSet::new();
        let mut tick: u64 = 0;

        info!(
            interval_ms = self.config.component_interval_ms,
            max_in_flight = self.config.max_in_flight,
            "Component loop started"
        );

        loop {
            if *signal.borrow() != LoopSignal::Run {
                break;
            }

            let now = Instant::now();
            let registrations = self.store.registrations();
            schedule.retain(|id, _| registrations.iter().any(|s| &s.component.component_id == id));

            for scheduled in registrations {
                let id = scheduled.component.component_id.clone();
                if in_flight.contains_key(&id) || schedule.get(&id).is_some_and(|next| *next > now) {
                    continue;
                }

                let every = scheduled
                    .component
                    .interval()
                    .filter(|every| !every.is_zero())
                    .unwrap_or(default_interval);
                tick += 1;
                schedule.remove(&id);

                let job = self.job(scheduled, tick, Arc::clone(&permits));
                let key = id.clone();
                let handle = tasks.spawn(async move {
                    job.run().await;
                    (key, now, every)
                });
                in_flight.insert(id, handle);
            }

            let wake = schedule
                .values()
                .min()
                .copied()
                .unwrap_or_else(|| Instant::now() + default_interval);

            tokio::select! {
                biased;
                _ = stop_requested(&mut signal) => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((id, started, every)) => {
                        in_flight.remove(&id);
                        // Skip, don't queue, against this component's own completion
                        schedule.insert(id, next_due(started, every, Instant::now()));
                    }
                    Err(e) => {
                        error!(error = %e, "Probe task panicked");
                        in_flight.retain(|_, handle| !handle.is_finished());
                    }
                },
                _ = self.store.changed() => {}
                _ = sleep_until(wake) => {}
            }
        }

        // Drain: no new probes; running ones still honor Abort
        debug!(in_flight = tasks.len(), "Waiting for in-flight probes");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Probe task panicked");
            }
        }

        info!(probes = tick, "Component loop stopped");
    }

    fn job(&self, scheduled: ScheduledComponent, tick: u64, permits: Arc<Semaphore>) -> ProbeJob {
        ProbeJob {
            scheduled,
            stamp_tick: tick,
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            timeout: self.config.probe_timeout(),
            defaults: self.config.probe_thresholds,
            permits,
            signal: self.signal.clone(),
        }
    }

    /// Probe every component in `due` once and wait for all of them.
    #[cfg(test)]
    async fn probe_cycle(&self, due: Vec<ScheduledComponent>, tick: u64) {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();
        for scheduled in due {
            tasks.spawn(self.job(scheduled, tick, Arc::clone(&permits)).run());
        }
        while tasks.join_next().await.is_some() {}
    }
}

struct ProbeJob {
    scheduled: ScheduledComponent,
    stamp_tick: u64,
    client: ProbeClient,
    store: Arc<HealthStore>,
    timeout: Duration,
    defaults: ProbeThresholds,
    permits: Arc<Semaphore>,
    signal: watch::Receiver<LoopSignal>,
}

impl ProbeJob {
    async fn run(self) {
        let ProbeJob {
            scheduled,
            stamp_tick,
            client,
            store,
            timeout,
            defaults,
            permits,
            mut signal,
        } = self;
        let component = &scheduled.component;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = abort_requested(&mut signal) => {
                ProbeResult::failed(ProbeFailure::Cancelled, started.elapsed().as_secs_f64())
            }
            result = async {
                // The semaphore is never closed
                let _permit = permits.acquire().await.ok();
                client.probe(&component.target, timeout).await
            } => result,
        };

        // The maintenance flag may have been toggled since the snapshot
        let maintenance = store
            .registration(&component.component_id)
            .map(|current| current.maintenance)
            .unwrap_or(component.maintenance);

        let health = health_from_probe(component, &result, maintenance, &defaults, Utc::now());

        if let Some(failure) = &result.failure {
            warn!(
                component_id = %component.component_id,
                kind = failure.kind(),
                reason = %failure.reason(),
                elapsed_ms = (result.elapsed_seconds * 1000.0) as u64,
                "Probe failed"
            );
        }

        let stamp = ProbeStamp {
            registration: scheduled.registration,
            tick: stamp_tick,
        };
        match store.update_component_health(&component.component_id, health, stamp) {
            Ok(true) => debug!(component_id = %component.component_id, tick = stamp_tick, "Component health updated"),
            Ok(false) => debug!(
                component_id = %component.component_id,
                tick = stamp_tick,
                "Discarded result from an earlier tick"
            ),
            Err(_) => debug!(
                component_id = %component.component_id,
                "Component deregistered while probing; result dropped"
            ),
        }
    }
}

/// Build the stored record for one probe outcome.
///
/// Per-component thresholds replace the defaults entirely.
pub fn health_from_probe(
    component: &RegisteredComponent,
    result: &ProbeResult,
    maintenance: bool,
    defaults: &ProbeThresholds,
    now: DateTime<Utc>,
) -> ComponentHealth {
    let thresholds = component.thresholds.unwrap_or(*defaults);
    let status = evaluate_probe(result, &thresholds, maintenance);

    let mut metadata = component.metadata.clone();
    metadata.extend(result.report.metadata.clone());
    metadata.insert("target".to_string(), component.target.clone().into());
    if let Some(code) = result.status_code {
        metadata.insert("status_code".to_string(), MetadataValue::Number(code as f64));
    }
    if let Some(failure) = &result.failure {
        metadata.insert("error_kind".to_string(), failure.kind().into());
        metadata.insert("error".to_string(), failure.reason().into());
    }

    ComponentHealth {
        component_id: component.component_id.clone(),
        name: component.name.clone(),
        status,
        last_check: Some(now),
        response_time: result.elapsed_seconds,
        metadata,
        metrics: result.report.metrics.clone(),
    }
}

/// First multiple of `interval` after `started` that lies beyond `finished`.
/// Ticks missed while a probe overran are skipped, not queued.
fn next_due(started: Instant, interval: Duration, finished: Instant) -> Instant {
    let next = started + interval;
    if next > finished || interval.is_zero() {
        return next;
    }
    let skipped = finished.duration_since(next).as_nanos() / interval.as_nanos() + 1;
    u64::try_from(interval.as_nanos().saturating_mul(skipped))
        .ok()
        .and_then(|offset| next.checked_add(Duration::from_nanos(offset)))
        .unwrap_or(finished + interval)
}

async fn stop_requested(signal: &mut watch::Receiver<LoopSignal>) {
    // A dropped sender also means stop
    let _ = signal.wait_for(|s| *s != LoopSignal::Run).await;
}

async fn abort_requested(signal: &mut watch::Receiver<LoopSignal>) {
    let _ = signal.wait_for(|s| *s == LoopSignal::Abort).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HealthStatus;
    use crate::test_support::{refused_url, MockService};

    fn scheduler(config: Config) -> (CollectionScheduler, Arc<HealthStore>, watch::Sender<LoopSignal>) {
        let store = Arc::new(HealthStore::new(config.metrics_capacity));
        let (tx, rx) = watch::channel(LoopSignal::Run);
        let scheduler = CollectionScheduler::new(
            Arc::new(config),
            Arc::clone(&store),
            ProbeClient::new().unwrap(),
            SystemSampler::new(),
            rx,
        );
        (scheduler, store, tx)
    }

    fn fast_config() -> Config {
        Config {
            system_interval_ms: 50,
            component_interval_ms: 100,
            probe_timeout_ms: 300,
            shutdown_grace_ms: 200,
            metrics_capacity: 3,
            ..Config::default()
        }
    }

    #[test]
    fn next_due_skips_missed_ticks() {
        let start = Instant::now();
        let interval = Duration::from_millis(100);

        assert_eq!(next_due(start, interval, start + Duration::from_millis(20)), start + interval);
        assert_eq!(
            next_due(start, interval, start + Duration::from_millis(250)),
            start + Duration::from_millis(300)
        );
        assert_eq!(
            next_due(start, interval, start + Duration::from_millis(100)),
            start + Duration::from_millis(200)
        );
    }

    #[test]
    fn next_due_survives_huge_tick_counts() {
        let start = Instant::now();
        let interval = Duration::from_nanos(1);
        let finished = start + Duration::from_secs(10);

        let next = next_due(start, interval, finished);
        assert!(next > finished);
        assert!(next <= finished + Duration::from_nanos(2));
    }

    #[test]
    fn component_thresholds_override_defaults() {
        let component = RegisteredComponent::new("svc-1", "Service", "http://x/health").with_thresholds(ProbeThresholds {
            warning_latency_ms: 10,
            critical_latency_ms: 20,
        });
        let result = ProbeResult::succeeded(200, 0.05);

        let health = health_from_probe(&component, &result, false, &ProbeThresholds::default(), Utc::now());
        assert_eq!(health.status, HealthStatus::Critical);

        let plain = RegisteredComponent::new("svc-2", "Service", "http://x/health");
        let health = health_from_probe(&plain, &result, false, &ProbeThresholds::default(), Utc::now());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!((health.response_time - 0.05).abs() < f64::EPSILON);
        assert_eq!(health.metadata.get("status_code"), Some(&MetadataValue::Number(200.0)));
    }

    #[test]
    fn failure_reason_lands_in_metadata() {
        let component = RegisteredComponent::new("svc-1", "Service", "http://x/health");
        let result = ProbeResult::failed(ProbeFailure::Timeout, 30.0);

        let health = health_from_probe(&component, &result, false, &ProbeThresholds::default(), Utc::now());
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.response_time, 30.0);
        assert_eq!(health.metadata.get("error_kind"), Some(&MetadataValue::from("timeout")));
        assert!(health.metadata.contains_key("error"));
        assert!(health.last_check.is_some());
    }

    #[tokio::test]
    async fn cycle_isolates_slow_components() {
        let service = MockService::start().await;
        let (scheduler, store, _tx) = scheduler(fast_config());

        store
            .register(RegisteredComponent::new("fast", "Fast", service.url("/health")))
            .unwrap();
        store
            .register(RegisteredComponent::new("hung", "Hung", service.url("/delay/5000")))
            .unwrap();
        store
            .register(RegisteredComponent::new("gone", "Gone", refused_url().await))
            .unwrap();

        let started = std::time::Instant::now();
        scheduler.probe_cycle(store.registrations(), 1).await;
        assert!(started.elapsed() < Duration::from_secs(3));

        let fast = store.get_component_health("fast").unwrap();
        assert_eq!(fast.status, HealthStatus::Healthy);
        assert!(fast.response_time < 0.3);
        assert_eq!(fast.metrics.get("error_rate"), Some(&0.01));

        let hung = store.get_component_health("hung").unwrap();
        assert_eq!(hung.status, HealthStatus::Critical);
        assert_eq!(hung.metadata.get("error_kind"), Some(&MetadataValue::from("timeout")));
        assert!(hung.response_time >= 0.3);

        let gone = store.get_component_health("gone").unwrap();
        assert_eq!(gone.status, HealthStatus::Critical);
        assert_eq!(gone.metadata.get("error_kind"), Some(&MetadataValue::from("connect")));
    }

    #[tokio::test]
    async fn bounded_fan_out_still_probes_everyone() {
        let service = MockService::start().await;
        let config = Config {
            max_in_flight: 1,
            ..fast_config()
        };
        let (scheduler, store, _tx) = scheduler(config);
        for i in 0..4 {
            store
                .register(RegisteredComponent::new(format!("svc-{}", i), "Svc", service.url("/delay/20")))
                .unwrap();
        }

        scheduler.probe_cycle(store.registrations(), 1).await;

        for health in store.list_component_health() {
            assert_eq!(health.status, HealthStatus::Healthy, "{}", health.component_id);
        }
    }

    #[tokio::test]
    async fn abort_cancels_in_flight_probes() {
        let service = MockService::start().await;
        let config = Config {
            probe_timeout_ms: 10_000,
            ..fast_config()
        };
        let (scheduler, store, tx) = scheduler(config);
        store
            .register(RegisteredComponent::new("hung", "Hung", service.url("/delay/10000")))
            .unwrap();

        let aborter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(LoopSignal::Abort).unwrap();
            tx
        });

        let started = std::time::Instant::now();
        scheduler.probe_cycle(store.registrations(), 1).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        let _tx = aborter.await.unwrap();

        let hung = store.get_component_health("hung").unwrap();
        assert_eq!(hung.status, HealthStatus::Critical);
        assert_eq!(hung.metadata.get("error_kind"), Some(&MetadataValue::from("cancelled")));
    }

    #[tokio::test]
    async fn maintenance_toggle_applies_on_next_probe() {
        let (scheduler, store, _tx) = scheduler(fast_config());
        store
            .register(RegisteredComponent::new("gone", "Gone", refused_url().await))
            .unwrap();
        store.set_maintenance("gone", true).unwrap();

        scheduler.probe_cycle(store.registrations(), 1).await;
        assert_eq!(
            store.get_component_health("gone").unwrap().status,
            HealthStatus::Maintenance
        );

        store.set_maintenance("gone", false).unwrap();
        scheduler.probe_cycle(store.registrations(), 2).await;
        assert_eq!(
            store.get_component_health("gone").unwrap().status,
            HealthStatus::Critical
        );
    }

    #[tokio::test]
    async fn loops_run_until_drained() {
        let service = MockService::start().await;
        let (scheduler, store, tx) = scheduler(fast_config());
        store
            .register(RegisteredComponent::new("svc-1", "Service", service.url("/health")))
            .unwrap();

        let handles = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(
            store.get_component_health("svc-1").unwrap().status,
            HealthStatus::Healthy
        );
        // Ring capacity is 3 and the system loop ticked more often than that
        assert_eq!(store.recent_metrics(10).len(), 3);
        assert!(store.system_health().is_some());

        tx.send(LoopSignal::Drain).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            handles.system.await.unwrap();
            handles.components.await.unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn late_registration_is_picked_up() {
        let service = MockService::start().await;
        let config = Config {
            component_interval_ms: 60_000,
            ..fast_config()
        };
        let (scheduler, store, tx) = scheduler(config);
        let handles = scheduler.spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        store
            .register(RegisteredComponent::new("late", "Late", service.url("/health")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            store.get_component_health("late").unwrap().status,
            HealthStatus::Healthy
        );

        tx.send(LoopSignal::Drain).unwrap();
        let _ = handles.system.await;
        let _ = handles.components.await;
    }

    #[tokio::test]
    async fn override_interval_keeps_cadence_while_peer_hangs() {
        let service = MockService::start().await;
        let config = Config {
            component_interval_ms: 60_000,
            probe_timeout_ms: 1_500,
            ..fast_config()
        };
        let (scheduler, store, tx) = scheduler(config);
        store
            .register(
                RegisteredComponent::new("fast", "Fast", service.url("/health"))
                    .with_interval(Duration::from_millis(100)),
            )
            .unwrap();
        store
            .register(RegisteredComponent::new("hung", "Hung", service.url("/delay/10000")))
            .unwrap();

        let handles = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let first = store.get_component_health("fast").unwrap().last_check;
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let later = store.get_component_health("fast").unwrap().last_check;
        assert!(later > first, "fast component was not checked again while its peer hung");
        // The hung target is still inside its timeout
        assert_eq!(store.get_component_health("hung").unwrap().last_check, None);

        tx.send(LoopSignal::Abort).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            handles.system.await.unwrap();
            handles.components.await.unwrap();
        })
        .await
        .unwrap();
        assert_eq!(
            store.get_component_health("hung").unwrap().metadata.get("error_kind"),
            Some(&MetadataValue::from("cancelled"))
        );
    }
}
