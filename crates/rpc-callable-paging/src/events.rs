use rpc_callable_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the paging decorator.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A page was fetched from the underlying callable.
    PageFetched {
        pattern_name: String,
        timestamp: Instant,
        element_count: usize,
        is_last_page: bool,
    },
}

impl ResilienceEvent for PageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PageEvent::PageFetched { .. } => "PageFetched",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PageEvent::PageFetched { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            PageEvent::PageFetched { pattern_name, .. } => pattern_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_name() {
        let event = PageEvent::PageFetched {
            pattern_name: "p".into(),
            timestamp: Instant::now(),
            element_count: 3,
            is_last_page: false,
        };
        assert_eq!(event.event_type(), "PageFetched");
        assert_eq!(event.pattern_name(), "p");
    }
}
