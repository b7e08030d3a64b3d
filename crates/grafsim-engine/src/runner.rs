use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use grafsim_core::config::SimulationConfig;
use grafsim_core::error::Result;
use grafsim_core::event::EventBus;
use grafsim_core::types::{SessionId, SimEvent};
use grafsim_core::value::Value;

use crate::simulator::Simulator;

/// A variable write delivered to a running simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableWrite {
    pub name: String,
    pub value: Value,
}

impl VariableWrite {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What a real-time run ended with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: SessionId,
    pub ticks: u64,
    pub firings: u64,
    pub active_steps: Vec<String>,
    pub cancelled: bool,
}

/// Real-time driver: ticks a simulator on a tokio interval.
///
/// Logical time is the wall time elapsed since start. Every tick is
/// published on the event bus; the loop ends on cancellation or after
/// `max_ticks` (when non-zero).
pub struct TickRunner {
    config: SimulationConfig,
    simulator: Simulator,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    inputs: Option<mpsc::Receiver<VariableWrite>>,
}

impl TickRunner {
    pub fn new(
        config: SimulationConfig,
        simulator: Simulator,
        event_bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            simulator,
            event_bus,
            cancel,
            inputs: None,
        }
    }

    /// Accept variable writes from a channel while running.
    pub fn with_inputs(mut self, inputs: mpsc::Receiver<VariableWrite>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    /// Run the tick loop. Blocks until cancelled or `max_ticks` is reached.
    pub async fn run(mut self) -> Result<RunSummary> {
        let session_id = SessionId::new();
        let period = Duration::from_millis(self.config.tick_ms.max(1));
        let started = Instant::now();
        let mut inputs = self.inputs.take();
        let mut inputs_open = inputs.is_some();
        let mut firings: u64 = 0;
        let mut cancelled = false;

        let active_steps = self.simulator.start(0);
        info!(
            session = %session_id,
            tick_ms = self.config.tick_ms,
            max_ticks = self.config.max_ticks,
            "Tick runner started"
        );
        self.event_bus.publish(SimEvent::Started {
            session_id: session_id.clone(),
            active_steps,
            timestamp: Utc::now(),
        });

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        interval.tick().await;

        loop {
            if self.config.max_ticks > 0 && self.simulator.tick_count() >= self.config.max_ticks {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                write = next_input(&mut inputs), if inputs_open => {
                    match write {
                        Some(w) => {
                            if let Err(e) = self.simulator.set_variable(&w.name, w.value) {
                                warn!(session = %session_id, variable = %w.name, error = %e, "Rejected variable write");
                            }
                        }
                        None => inputs_open = false,
                    }
                    continue;
                }
                _ = self.cancel.cancelled() => {
                    info!(session = %session_id, "Tick runner shutting down");
                    cancelled = true;
                    break;
                }
            }

            let now_ms = started.elapsed().as_millis() as u64;
            let outcome = self.simulator.tick(now_ms)?;
            firings += outcome.fired_transitions.len() as u64;

            self.event_bus.publish(SimEvent::Tick {
                session_id: session_id.clone(),
                tick: self.simulator.tick_count(),
                time_ms: now_ms,
                active_steps: outcome.active_steps,
                fired_transitions: outcome.fired_transitions,
            });
        }

        let ticks = self.simulator.tick_count();
        let summary = RunSummary {
            session_id: session_id.clone(),
            ticks,
            firings,
            active_steps: self.simulator.active_steps(),
            cancelled,
        };
        self.simulator.stop();
        self.event_bus.publish(SimEvent::Stopped {
            session_id,
            ticks,
            timestamp: Utc::now(),
        });
        Ok(summary)
    }
}

async fn next_input(inputs: &mut Option<mpsc::Receiver<VariableWrite>>) -> Option<VariableWrite> {
    match inputs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
