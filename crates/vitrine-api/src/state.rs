//! API application state, health tracking, and helpers.

use std::sync::{Arc, Mutex, MutexGuard};

use vitrine_config::SettingsFacade;
use vitrine_events::{Event, EventBus};
use vitrine_relay::ContactRelay;
use vitrine_telemetry::Metrics;

/// Shared reference to the settings backend.
pub(crate) type SharedSettings = Arc<dyn SettingsFacade>;

pub(crate) struct ApiState {
    pub(crate) settings: SharedSettings,
    pub(crate) relay: ContactRelay,
    pub(crate) telemetry: Metrics,
    pub(crate) events: EventBus,
    health_status: Mutex<Vec<String>>,
}

impl ApiState {
    pub(crate) fn new(
        settings: SharedSettings,
        relay: ContactRelay,
        telemetry: Metrics,
        events: EventBus,
    ) -> Self {
        Self {
            settings,
            relay,
            telemetry,
            events,
            health_status: Mutex::new(Vec::new()),
        }
    }

    /// Publish a domain event and count it in the emitted-event metrics.
    pub(crate) fn publish_event(&self, event: Event) {
        self.telemetry.inc_event(event.kind());
        let _ = self.events.publish(event);
    }

    pub(crate) fn add_degraded_component(&self, component: &str) -> bool {
        let mut guard = Self::lock_guard(&self.health_status, "health_status");
        if guard.iter().any(|entry| entry == component) {
            return false;
        }
        guard.push(component.to_string());
        guard.sort();
        let snapshot = guard.clone();
        drop(guard);
        self.publish_event(Event::HealthChanged { degraded: snapshot });
        true
    }

    pub(crate) fn remove_degraded_component(&self, component: &str) -> bool {
        let mut guard = Self::lock_guard(&self.health_status, "health_status");
        let previous = guard.len();
        guard.retain(|entry| entry != component);
        if guard.len() == previous {
            return false;
        }
        let snapshot = guard.clone();
        drop(guard);
        self.publish_event(Event::HealthChanged { degraded: snapshot });
        true
    }

    pub(crate) fn current_health_degraded(&self) -> Vec<String> {
        Self::lock_guard(&self.health_status, "health_status").clone()
    }

    fn lock_guard<'a, T>(mutex: &'a Mutex<T>, name: &'a str) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|err| {
            panic!("failed to lock {name}: {err}");
        })
    }
}
