//! Process-wide health state.
//!
//! All mutation goes through [`HealthStore`] methods, each of which holds the
//! write lock for its whole body, so readers always see whole records.
//! Stored records are value snapshots: updates replace them wholesale.

use crate::{
    error::{CoreError, Result},
    model::{ComponentHealth, RegisteredComponent, SystemHealth, SystemMetrics},
};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Notify;

/// Identifies which registration and which scheduler tick produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStamp {
    pub registration: u64,
    pub tick: u64,
}

/// A registration as seen by the scheduler at the start of a tick
#[derive(Debug, Clone)]
pub struct ScheduledComponent {
    pub component: RegisteredComponent,
    pub registration: u64,
}

struct ComponentEntry {
    registration: RegisteredComponent,
    registration_id: u64,
    health: ComponentHealth,
    last_tick: u64,
}

struct StoreInner {
    components: HashMap<String, ComponentEntry>,
    metrics: VecDeque<SystemMetrics>,
    capacity: usize,
    system_health: Option<SystemHealth>,
    next_registration: u64,
}

impl StoreInner {
    fn push_metrics(&mut self, sample: SystemMetrics) {
        while self.metrics.len() >= self.capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(sample);
    }
}

pub struct HealthStore {
    inner: RwLock<StoreInner>,
    changed: Notify,
}

impl HealthStore {
    /// `capacity` bounds the system metrics ring; it is raised to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(StoreInner {
                components: HashMap::new(),
                metrics: VecDeque::with_capacity(capacity),
                capacity,
                system_health: None,
                next_registration: 1,
            }),
            changed: Notify::new(),
        }
    }

    pub fn register(&self, component: RegisteredComponent) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if inner.components.contains_key(&component.component_id) {
                return Err(CoreError::duplicate_component(&component.component_id));
            }

            let registration_id = inner.next_registration;
            inner.next_registration += 1;

            let entry = ComponentEntry {
                health: ComponentHealth::unknown(&component),
                registration_id,
                last_tick: 0,
                registration: component,
            };
            inner.components.insert(entry.registration.component_id.clone(), entry);
        }

        self.changed.notify_one();
        Ok(())
    }

    /// Removes the registration and its health record together.
    pub fn deregister(&self, component_id: &str) -> Result<RegisteredComponent> {
        let removed = self
            .inner
            .write()
            .components
            .remove(component_id)
            .ok_or_else(|| CoreError::not_found(component_id))?;

        self.changed.notify_one();
        Ok(removed.registration)
    }

    /// Replace a component's health record.
    ///
    /// Fails with `NotFound` if the component was deregistered (or
    /// deregistered and registered again) since `stamp` was issued. Returns
    /// `Ok(false)` without writing when a result from the same or a later
    /// tick has already been stored.
    pub fn update_component_health(&self, component_id: &str, health: ComponentHealth, stamp: ProbeStamp) -> Result<bool> {
        let mut inner = self.inner.write();
        let entry = inner
            .components
            .get_mut(component_id)
            .filter(|entry| entry.registration_id == stamp.registration)
            .ok_or_else(|| CoreError::not_found(component_id))?;

        if stamp.tick <= entry.last_tick {
            return Ok(false);
        }

        entry.health = health;
        entry.last_tick = stamp.tick;
        Ok(true)
    }

    pub fn set_maintenance(&self, component_id: &str, maintenance: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let entry = inner
            .components
            .get_mut(component_id)
            .ok_or_else(|| CoreError::not_found(component_id))?;
        entry.registration.maintenance = maintenance;
        Ok(())
    }

    /// Push a sample, evicting the oldest once the ring is full.
    pub fn append_system_metrics(&self, sample: SystemMetrics) {
        self.inner.write().push_metrics(sample);
    }

    /// Append a sample and its classification in one step, so readers never
    /// see a health status for a sample that is not in the ring yet.
    pub fn record_system_sample(&self, sample: SystemMetrics, health: SystemHealth) {
        let mut inner = self.inner.write();
        inner.push_metrics(sample);
        inner.system_health = Some(health);
    }

    pub fn system_health(&self) -> Option<SystemHealth> {
        self.inner.read().system_health.clone()
    }

    pub fn get_component_health(&self, component_id: &str) -> Option<ComponentHealth> {
        self.inner
            .read()
            .components
            .get(component_id)
            .map(|entry| entry.health.clone())
    }

    /// All component records, ordered by component id
    pub fn list_component_health(&self) -> Vec<ComponentHealth> {
        let mut health: Vec<_> = self
            .inner
            .read()
            .components
            .values()
            .map(|entry| entry.health.clone())
            .collect();
        health.sort_by(|a, b| a.component_id.cmp(&b.component_id));
        health
    }

    /// Up to `n` most recent samples, oldest first
    pub fn recent_metrics(&self, n: usize) -> Vec<SystemMetrics> {
        let inner = self.inner.read();
        let skip = inner.metrics.len().saturating_sub(n);
        inner.metrics.iter().skip(skip).cloned().collect()
    }

    pub fn latest_metrics(&self) -> Option<SystemMetrics> {
        self.inner.read().metrics.back().cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.inner.read().components.len()
    }

    pub fn registration(&self, component_id: &str) -> Option<RegisteredComponent> {
        self.inner
            .read()
            .components
            .get(component_id)
            .map(|entry| entry.registration.clone())
    }

    /// Snapshot of the registration set, ordered by component id
    pub fn registrations(&self) -> Vec<ScheduledComponent> {
        let mut scheduled: Vec<_> = self
            .inner
            .read()
            .components
            .values()
            .map(|entry| ScheduledComponent {
                component: entry.registration.clone(),
                registration: entry.registration_id,
            })
            .collect();
        scheduled.sort_by(|a, b| a.component.component_id.cmp(&b.component.component_id));
        scheduled
    }

    /// Drop all collected state but keep registrations: every component
    /// goes back to a fresh unknown record and the metrics ring empties.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        for entry in inner.components.values_mut() {
            entry.health = ComponentHealth::unknown(&entry.registration);
            entry.last_tick = 0;
        }
        inner.metrics.clear();
        inner.system_health = None;
    }

    /// Resolves after the registration set changed. A change that happened
    /// while nobody was waiting is remembered for the next call.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}
