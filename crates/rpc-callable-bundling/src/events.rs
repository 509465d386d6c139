use rpc_callable_core::ResilienceEvent;
use std::time::Instant;

/// Why a bundle was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// `accumulated_elements >= element_count_threshold`.
    ElementCount,
    /// The oldest request's wait reached `delay_threshold`.
    Delay,
    /// Factory or service close.
    External,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlushTrigger::ElementCount => "element_count",
            FlushTrigger::Delay => "delay",
            FlushTrigger::External => "external",
        };
        f.write_str(s)
    }
}

/// Events emitted by the bundling decorator.
#[derive(Debug, Clone)]
pub enum BundleEvent {
    /// A bundle was detached and flushed.
    Flush {
        pattern_name: String,
        timestamp: Instant,
        trigger: FlushTrigger,
        request_count: usize,
        element_count: usize,
    },
    /// A merged call failed and its exception was fanned out to every
    /// issuer in the bundle.
    ExceptionFanOut {
        pattern_name: String,
        timestamp: Instant,
        request_count: usize,
    },
}

impl ResilienceEvent for BundleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BundleEvent::Flush { .. } => "Flush",
            BundleEvent::ExceptionFanOut { .. } => "ExceptionFanOut",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BundleEvent::Flush { timestamp, .. } | BundleEvent::ExceptionFanOut { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BundleEvent::Flush { pattern_name, .. } | BundleEvent::ExceptionFanOut { pattern_name, .. } => {
                pattern_name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_trigger_display() {
        assert_eq!(FlushTrigger::ElementCount.to_string(), "element_count");
        assert_eq!(FlushTrigger::Delay.to_string(), "delay");
        assert_eq!(FlushTrigger::External.to_string(), "external");
    }

    #[test]
    fn event_type_names() {
        let flush = BundleEvent::Flush {
            pattern_name: "p".into(),
            timestamp: Instant::now(),
            trigger: FlushTrigger::ElementCount,
            request_count: 2,
            element_count: 4,
        };
        assert_eq!(flush.event_type(), "Flush");
        assert_eq!(flush.pattern_name(), "p");
    }
}
