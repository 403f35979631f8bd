use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::types::{Facts, Path, RuleId, RuleResult};

/// Emitted by the executor around every physical execution of a rule body.
/// Cache hits and skipped rules emit nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    Started {
        rule: RuleId,
        path_stack: Vec<Path>,
        facts: Facts,
    },
    Finished {
        rule: RuleId,
        path_stack: Vec<Path>,
        facts: Facts,
        result: RuleResult,
        duration: Duration,
    },
}

impl RuleEvent {
    #[must_use]
    pub fn rule(&self) -> &RuleId {
        match self {
            RuleEvent::Started { rule, .. } | RuleEvent::Finished { rule, .. } => rule,
        }
    }

    #[must_use]
    pub fn path_stack(&self) -> &[Path] {
        match self {
            RuleEvent::Started { path_stack, .. } | RuleEvent::Finished { path_stack, .. } => {
                path_stack
            }
        }
    }

    #[must_use]
    pub fn facts(&self) -> &Facts {
        match self {
            RuleEvent::Started { facts, .. } | RuleEvent::Finished { facts, .. } => facts,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&RuleResult> {
        match self {
            RuleEvent::Started { .. } => None,
            RuleEvent::Finished { result, .. } => Some(result),
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, RuleEvent::Started { .. })
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, RuleEvent::Finished { .. })
    }
}

fn joined(paths: &[Path]) -> String {
    paths
        .iter()
        .fold(Path::root(), |acc, path| acc.join(path))
        .to_string()
}

impl fmt::Display for RuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleEvent::Started {
                rule, path_stack, ..
            } => write!(f, "started {rule} at /{}", joined(path_stack)),
            RuleEvent::Finished {
                rule,
                path_stack,
                result,
                duration,
                ..
            } => write!(
                f,
                "finished {rule} at /{} with {result} in {duration:?}",
                joined(path_stack)
            ),
        }
    }
}

/// Receives executor events. Called synchronously on the thread that ran the
/// rule body, so implementations must be quick and thread-safe.
pub trait EventPublisher: fmt::Debug + Send + Sync {
    fn publish(&self, source: &str, event: &RuleEvent);
}

/// Forwards events to `tracing`: starts at TRACE, finishes at DEBUG.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, source: &str, event: &RuleEvent) {
        match event {
            RuleEvent::Started {
                rule, path_stack, ..
            } => {
                trace!(source, rule = %rule, path = %joined(path_stack), "rule started");
            }
            RuleEvent::Finished {
                rule,
                path_stack,
                result,
                duration,
                ..
            } => {
                debug!(
                    source,
                    rule = %rule,
                    path = %joined(path_stack),
                    code = %result.code(),
                    elapsed_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
                    "rule finished"
                );
            }
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _source: &str, _event: &RuleEvent) {}
}

/// Keeps every event in memory, in publication order.
#[derive(Debug, Default)]
pub struct CollectingPublisher {
    events: Mutex<Vec<RuleEvent>>,
}

impl CollectingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RuleEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn started_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_started()).count()
    }

    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_finished()).count()
    }

    /// Events concerning one rule.
    #[must_use]
    pub fn events_for(&self, rule: &str) -> Vec<RuleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.rule().as_str() == rule)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventPublisher for CollectingPublisher {
    fn publish(&self, _source: &str, event: &RuleEvent) {
        self.events.lock().push(event.clone());
    }
}
