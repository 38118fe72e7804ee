//! Edge monitors: one polling worker per port group with a triggering input.

use std::sync::Arc;
use std::time::Duration;

use domotica_gpio::{GpioBackend, InputLine, Pull};
use domotica_types::{Edge, PinKind};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::ActionInvoker;
use crate::actuator::{Actuator, PinError};
use crate::lifecycle::Lifecycle;
use crate::registry::{PinDescriptor, PortGroup};

/// Watches a trigger input and drives the outputs of its group.
pub struct EdgeMonitor {
    group: PortGroup,
    trigger: PinDescriptor,
    line: Box<dyn InputLine>,
    actuator: Arc<Actuator>,
    invoker: Arc<dyn ActionInvoker>,
    lifecycle: Lifecycle,
    /// Logical level seen on the previous cycle
    active: bool,
}

impl EdgeMonitor {
    /// Claim the group's trigger line. Returns `Ok(None)` for groups without one.
    pub fn new(
        group: &PortGroup,
        backend: &dyn GpioBackend,
        actuator: Arc<Actuator>,
        invoker: Arc<dyn ActionInvoker>,
        lifecycle: Lifecycle,
    ) -> Result<Option<Self>, PinError> {
        let Some(trigger) = group.trigger().cloned() else {
            return Ok(None);
        };
        let line = backend
            .input(trigger.pin, Pull::idle_for(trigger.active_high))
            .map_err(|source| PinError::Gpio {
                pin: trigger.pin,
                source,
            })?;
        let active = line.level().is_active(trigger.active_high);

        Ok(Some(Self {
            group: group.clone(),
            trigger,
            line,
            actuator,
            invoker,
            lifecycle,
            active,
        }))
    }

    pub fn trigger_pin(&self) -> u8 {
        self.trigger.pin
    }

    /// One polling cycle: sample the trigger and react to a changed level.
    pub fn poll(&mut self) -> Option<Edge> {
        let active = self.line.level().is_active(self.trigger.active_high);
        if active == self.active {
            return None;
        }
        self.active = active;

        let edge = if active { Edge::Rising } else { Edge::Falling };
        debug!(
            group = self.group.index,
            pin = self.trigger.pin,
            ?edge,
            "Edge detected"
        );
        self.on_edge(edge);
        Some(edge)
    }

    fn on_edge(&self, edge: Edge) {
        if self.lifecycle.in_standby() {
            debug!(pin = self.trigger.pin, "Standby, edge ignored");
            return;
        }

        // Buttons act on press only; probes act on both transitions
        let toggles = match edge {
            Edge::Rising => true,
            Edge::Falling => self.trigger.kind == PinKind::Probe,
        };
        if toggles {
            for output in self.group.outputs() {
                if let Err(e) = self.actuator.toggle(output.pin as i64) {
                    warn!(
                        group = self.group.index,
                        pin = output.pin,
                        "Failed to toggle output: {}",
                        e
                    );
                }
            }
        }

        let call = &self.group.call;
        let fire = match edge {
            Edge::Rising => call.on_rising,
            Edge::Falling => call.on_falling,
        };
        if fire {
            if let Some(action) = &call.action {
                info!(group = self.group.index, action = %action, "Firing action");
                self.invoker.invoke(action);
            }
        }
    }

    /// Poll every `pause` until shutdown is requested.
    pub async fn run(mut self, pause: Duration) {
        let shutdown = self.lifecycle.token();
        info!(
            group = self.group.index,
            pin = self.trigger.pin,
            kind = %self.trigger.kind,
            "Edge monitor started"
        );
        loop {
            self.poll();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!(
            group = self.group.index,
            pin = self.trigger.pin,
            "Edge monitor stopped"
        );
    }
}

/// Start one monitor per group that has a triggering input.
pub fn spawn_monitors(
    groups: &[PortGroup],
    backend: &dyn GpioBackend,
    actuator: &Arc<Actuator>,
    invoker: &Arc<dyn ActionInvoker>,
    lifecycle: &Lifecycle,
    pause: Duration,
) -> Result<Vec<JoinHandle<()>>, PinError> {
    let mut monitors = Vec::new();
    for group in groups {
        if let Some(monitor) = EdgeMonitor::new(
            group,
            backend,
            actuator.clone(),
            invoker.clone(),
            lifecycle.clone(),
        )? {
            monitors.push(monitor);
        }
    }

    // Claim every trigger before any worker runs
    Ok(monitors
        .into_iter()
        .map(|monitor| tokio::spawn(monitor.run(pause)))
        .collect())
}
