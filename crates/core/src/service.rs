//! Collector lifecycle and query surface.

use crate::{
    config::Config,
    error::{CoreError, Result},
    metrics::SystemSampler,
    model::{
        ComponentHealth, ComponentView, HealthStatus, HealthSummary, RegisteredComponent, ServiceState,
        StatusCounts, SystemHealth, SystemMetrics,
    },
    probe::ProbeClient,
    scheduler::{CollectionScheduler, LoopSignal, SchedulerHandles},
    store::HealthStore,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// How long cancelled probes get to record their outcome after the grace
/// period runs out
const ABORT_WAIT: Duration = Duration::from_secs(1);

struct Running {
    signal: watch::Sender<LoopSignal>,
    handles: SchedulerHandles,
}

/// Long-running collector: owns the store and, while running, the
/// scheduler loops and the shared outbound client.
///
/// Query methods never touch the network and are safe to call from any
/// thread at any time, including while stopped.
pub struct CollectorService {
    config: Arc<Config>,
    store: Arc<HealthStore>,
    state: Mutex<ServiceState>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl CollectorService {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(HealthStore::new(config.metrics_capacity));
        Self {
            config: Arc::new(config),
            store,
            state: Mutex::new(ServiceState::Stopped),
            running: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Launch both collection loops.
    ///
    /// Returns once the loops are spawned. Fails with
    /// [`CoreError::AlreadyRunning`] unless the service is stopped; a client
    /// allocation failure leaves it stopped.
    pub async fn start(&self) -> Result<()> {
        self.transition(ServiceState::Stopped, ServiceState::Starting)
            .map_err(|_| CoreError::AlreadyRunning)?;
        info!("Starting collector");

        let client = match ProbeClient::new() {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Could not allocate outbound client");
                self.set_state(ServiceState::Stopped);
                return Err(e);
            }
        };

        self.store.reset();

        // Baseline readings block briefly
        let sampler = match tokio::task::spawn_blocking(SystemSampler::new).await {
            Ok(sampler) => sampler,
            Err(e) => {
                error!(error = %e, "System sampler setup failed");
                self.set_state(ServiceState::Stopped);
                return Err(CoreError::system_info(format!("sampler setup failed: {}", e)));
            }
        };

        let (signal, receiver) = watch::channel(LoopSignal::Run);
        let scheduler = CollectionScheduler::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            client,
            sampler,
            receiver,
        );
        let handles = scheduler.spawn();

        *self.running.lock().await = Some(Running { signal, handles });
        self.set_state(ServiceState::Running);
        info!(components = self.store.registered_count(), "Collector running");
        Ok(())
    }

    /// Stop both loops and release the outbound client.
    ///
    /// In-flight probes get `shutdown_grace_ms` to finish; whatever is still
    /// running after that is recorded as cancelled. All health records and
    /// samples are cleared afterwards; registrations are kept.
    pub async fn stop(&self) -> Result<()> {
        self.transition(ServiceState::Running, ServiceState::Stopping)
            .map_err(|_| CoreError::NotRunning)?;
        info!("Stopping collector");

        if let Some(Running { signal, handles }) = self.running.lock().await.take() {
            let mut system = Some(handles.system);
            let mut components = Some(handles.components);

            let _ = signal.send(LoopSignal::Drain);
            let drained = join_within(self.config.shutdown_grace(), &mut system, &mut components).await;

            if !drained {
                warn!(
                    grace_ms = self.config.shutdown_grace_ms,
                    "Grace period elapsed; cancelling in-flight probes"
                );
                let _ = signal.send(LoopSignal::Abort);
                if !join_within(ABORT_WAIT, &mut system, &mut components).await {
                    error!("Collection loops did not exit; aborting them");
                    for handle in system.iter().chain(components.iter()) {
                        handle.abort();
                    }
                }
            }
        }

        self.store.reset();
        self.set_state(ServiceState::Stopped);
        info!("Collector stopped");
        Ok(())
    }

    pub fn register(&self, component: RegisteredComponent) -> Result<()> {
        debug!(component_id = %component.component_id, target = %component.target, "Registering component");
        self.store.register(component)
    }

    pub fn deregister(&self, component_id: &str) -> Result<RegisteredComponent> {
        debug!(component_id, "Deregistering component");
        self.store.deregister(component_id)
    }

    pub fn set_maintenance(&self, component_id: &str, maintenance: bool) -> Result<()> {
        info!(component_id, maintenance, "Maintenance flag changed");
        self.store.set_maintenance(component_id, maintenance)
    }

    pub fn get_component_health(&self, component_id: &str) -> Option<ComponentHealth> {
        self.store.get_component_health(component_id)
    }

    pub fn list_component_health(&self) -> Vec<ComponentHealth> {
        self.store.list_component_health()
    }

    pub fn recent_metrics(&self, n: usize) -> Vec<SystemMetrics> {
        self.store.recent_metrics(n)
    }

    /// Classification of the most recent system sample
    pub fn aggregate_system_health(&self) -> Option<SystemHealth> {
        self.store.system_health()
    }

    /// One consistent-enough snapshot for reporting, with staleness applied.
    pub fn health_summary(&self) -> HealthSummary {
        let now = Utc::now();
        let staleness = self.config.staleness();
        let system = self.store.system_health();
        let latest_metrics = self.store.latest_metrics();

        let mut status_counts = StatusCounts::default();
        let components: Vec<ComponentView> = self
            .store
            .list_component_health()
            .into_iter()
            .map(|health| {
                let effective_status = health.effective_status(now, staleness);
                status_counts.record(effective_status);
                ComponentView {
                    stale: health.is_stale(now, staleness),
                    effective_status,
                    health,
                }
            })
            .collect();

        let overall_status = overall_status(system.as_ref(), &components);

        HealthSummary {
            generated_at: now,
            overall_status,
            system,
            latest_metrics,
            registered_count: components.len(),
            components,
            status_counts,
        }
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> std::result::Result<(), ServiceState> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(*state);
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: ServiceState) {
        *self.state.lock() = to;
    }
}

/// Worst in-band status over the system aggregate and every component.
fn overall_status(system: Option<&SystemHealth>, components: &[ComponentView]) -> HealthStatus {
    let statuses = system
        .map(|s| s.status)
        .into_iter()
        .chain(components.iter().map(|c| c.effective_status));
    HealthStatus::worst(statuses).unwrap_or(HealthStatus::Unknown)
}

/// Wait for both loops, giving up after `limit`. Returns whether both
/// exited. A joined loop's slot is emptied so it is never polled twice.
async fn join_within(
    limit: Duration,
    system: &mut Option<JoinHandle<()>>,
    components: &mut Option<JoinHandle<()>>,
) -> bool {
    tokio::time::timeout(limit, async {
        join_loop("system", system).await;
        join_loop("component", components).await;
    })
    .await
    .is_ok()
}

async fn join_loop(name: &str, slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.as_mut() {
        let joined = handle.await;
        *slot = None;
        if let Err(e) = joined {
            error!(loop_name = name, error = %e, "Collection loop ended abnormally");
        }
    }
}
