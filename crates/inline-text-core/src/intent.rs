//! Why the caret last moved.

use std::time::Duration;

use web_time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretIntent {
    Enter,
    Click,
}

/// Most recent [`CaretIntent`], valid for a short time after it was recorded.
#[derive(Debug, Clone)]
pub struct CaretIntentSlot {
    ttl: Duration,
    current: Option<(CaretIntent, Instant)>,
}

impl CaretIntentSlot {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn record(&mut self, intent: CaretIntent, now: Instant) {
        self.current = Some((intent, now + self.ttl));
    }

    /// The live intent at `now`, if it has not expired.
    pub fn get(&self, now: Instant) -> Option<CaretIntent> {
        self.current
            .filter(|(_, expires)| now < *expires)
            .map(|(intent, _)| intent)
    }

    /// Drop an expired intent. Returns whether one was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.current {
            Some((_, expires)) if now >= expires => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}
