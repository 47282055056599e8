//! Violation alerts.
//!
//! Exactly-once delivery per threshold crossing comes from the reconciler's
//! `NewViolation` event, so no suppression window is kept here.

use crate::reconcile::TransitionEvent;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationAlert {
    /// 1-based zone number as shown to operators.
    pub zone_number: usize,
    pub title: String,
    pub message: String,
}

impl ViolationAlert {
    fn for_zone(index: usize) -> Self {
        let zone_number = index + 1;
        Self {
            zone_number,
            title: "Illegal Parking Detected".to_string(),
            message: format!("Zone {zone_number} has illegal parking detected."),
        }
    }
}

/// Outward notification channel.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &ViolationAlert);
}

/// Emits alerts as warn-level log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, alert: &ViolationAlert) {
        warn!(zone = alert.zone_number, "{}", alert.message);
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: Mutex<Vec<ViolationAlert>>,
}

impl CollectingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<ViolationAlert> {
        self.alerts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for CollectingAlertSink {
    fn notify(&self, alert: &ViolationAlert) {
        if let Ok(mut guard) = self.alerts.lock() {
            guard.push(alert.clone());
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationDebouncer;

impl NotificationDebouncer {
    pub fn new() -> Self {
        Self
    }

    /// One alert per `NewViolation`; every other event is ignored.
    pub fn alerts(&self, events: &[TransitionEvent]) -> Vec<ViolationAlert> {
        events
            .iter()
            .filter_map(|event| match event {
                TransitionEvent::NewViolation(index) => Some(ViolationAlert::for_zone(*index)),
                TransitionEvent::BecameOccupied(_) | TransitionEvent::Cleared(_) => None,
            })
            .collect()
    }

    /// Deliver the alerts for `events` to `sink`, returning how many were sent.
    pub fn dispatch(&self, events: &[TransitionEvent], sink: &dyn AlertSink) -> usize {
        let alerts = self.alerts(events);
        for alert in &alerts {
            sink.notify(alert);
        }
        alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_new_violations_produce_alerts() {
        let debouncer = NotificationDebouncer::new();
        let events = [
            TransitionEvent::BecameOccupied(0),
            TransitionEvent::NewViolation(2),
            TransitionEvent::Cleared(1),
        ];

        let alerts = debouncer.alerts(&events);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone_number, 3);
        assert_eq!(alerts[0].message, "Zone 3 has illegal parking detected.");
    }

    #[test]
    fn dispatch_delivers_each_alert_once() {
        let debouncer = NotificationDebouncer::new();
        let sink = CollectingAlertSink::new();

        let sent = debouncer.dispatch(
            &[
                TransitionEvent::NewViolation(0),
                TransitionEvent::NewViolation(4),
            ],
            &sink,
        );

        assert_eq!(sent, 2);
        let numbers: Vec<usize> = sink.alerts().iter().map(|a| a.zone_number).collect();
        assert_eq!(numbers, vec![1, 5]);
    }

    #[test]
    fn no_events_no_alerts() {
        let sink = CollectingAlertSink::new();

        assert_eq!(NotificationDebouncer::new().dispatch(&[], &sink), 0);
        assert!(sink.alerts().is_empty());
    }
}
