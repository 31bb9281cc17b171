//! # LogWriter — event printer
//!
//! A subscriber that writes every built-in event to the `log` facade.
//!
//! ## Example output
//! ```text
//! [button-short] id=1 duration=80ms
//! [alarm] severity=3 msg="over temperature"
//! [connectivity] connected=true network="home"
//! [terminal] group=WIFI step=0 state=Success info="Connected"
//! [module] name="Clock" phase=Started
//! [module] name="Weather" phase=Failed reason=Some("module_fatal")
//! ```

use crate::events::{
    ButtonLongPress, ButtonShortPress, ConnectivityChanged, CriticalAlarm, CriticalAlarmOff,
    EventBus, LifecyclePhase, ModuleLifecycle, SubscriptionId, TerminalEvent,
};

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter {
    subscriptions: Vec<SubscriptionId>,
}

impl LogWriter {
    /// Subscribes to every built-in event type on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let subscriptions = vec![
            bus.subscribe(|e: &ButtonShortPress| {
                log::info!("[button-short] id={} duration={:?}", e.button_id, e.duration);
            }),
            bus.subscribe(|e: &ButtonLongPress| {
                log::info!("[button-long] id={} duration={:?}", e.button_id, e.duration);
            }),
            bus.subscribe(|e: &CriticalAlarm| {
                log::warn!("[alarm] severity={} msg={:?}", e.severity, e.message);
            }),
            bus.subscribe(|e: &CriticalAlarmOff| {
                log::info!("[alarm-off] reason={:?}", e.reason);
            }),
            bus.subscribe(|e: &ConnectivityChanged| {
                log::info!(
                    "[connectivity] connected={} network={:?}",
                    e.connected,
                    e.network
                );
            }),
            bus.subscribe(|e: &TerminalEvent| {
                log::debug!(
                    "[terminal] group={} step={} state={:?} info={:?}",
                    e.group,
                    e.step,
                    e.state,
                    e.info
                );
            }),
            bus.subscribe(|e: &ModuleLifecycle| match e.phase {
                LifecyclePhase::Failed => {
                    log::error!(
                        "[module] name={:?} phase={:?} reason={:?}",
                        e.module,
                        e.phase,
                        e.reason
                    );
                }
                _ => log::info!("[module] name={:?} phase={:?}", e.module, e.phase),
            }),
        ];
        Self { subscriptions }
    }

    /// Removes every subscription made by [`LogWriter::attach`].
    pub fn detach(self, bus: &EventBus) {
        for id in self.subscriptions {
            bus.unsubscribe(id);
        }
    }

    /// Number of event types this writer listens to.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True if the writer holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_round_trip() {
        let bus = EventBus::new();
        let writer = LogWriter::attach(&bus);
        assert_eq!(writer.len(), 7);
        assert_eq!(bus.subscriber_count::<ModuleLifecycle>(), 1);
        assert_eq!(
            bus.publish(&ModuleLifecycle {
                module: "Clock".into(),
                phase: LifecyclePhase::Started,
                reason: None,
            }),
            1
        );

        writer.detach(&bus);
        assert_eq!(bus.subscriber_count::<ModuleLifecycle>(), 0);
        assert_eq!(bus.subscriber_count::<TerminalEvent>(), 0);
    }
}
