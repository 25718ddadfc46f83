//! Deferred work primitives driven by the host clock.
//!
//! Nothing here owns a timer. The session is ticked with the current
//! [`Instant`] and asks these types what is due.

use std::time::Duration;

use web_time::Instant;

/// Single-slot coalescing flag for animation-frame work.
///
/// The first request in a frame stores its payload; later requests are
/// dropped until the slot is taken.
#[derive(Debug)]
pub struct FrameSlot<T> {
    pending: Option<T>,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this request scheduled the work.
    pub fn request(&mut self, payload: T) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(payload);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }
}

/// A cancellable one-shot deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arm (or re-arm) to fire `delay` after `now`.
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    /// Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.at.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if now >= at => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Debouncer with a leading and a trailing edge.
///
/// The first call in an idle period fires at once. Calls inside the quiet
/// window push the window out; if any were made, one trailing call fires when
/// the window finally elapses.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    quiet_until: Option<Instant>,
    trailing: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            quiet_until: None,
            trailing: false,
        }
    }

    /// Register a call. Returns `true` when it should run now.
    pub fn call(&mut self, now: Instant) -> bool {
        let idle = self.quiet_until.is_none_or(|until| now >= until);
        self.quiet_until = Some(now + self.window);
        if idle {
            self.trailing = false;
            return true;
        }
        self.trailing = true;
        false
    }

    /// Returns `true` when a trailing call is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.quiet_until {
            Some(until) if now >= until => {
                self.quiet_until = None;
                std::mem::take(&mut self.trailing)
            }
            _ => false,
        }
    }

    pub fn has_trailing(&self) -> bool {
        self.trailing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_frame_slot_coalesces() {
        let mut slot = FrameSlot::new();
        assert!(slot.request(Some("a")));
        assert!(!slot.request(None));
        assert_eq!(slot.take(), Some(Some("a")));
        assert_eq!(slot.take(), None);
        assert!(slot.request(None));
    }

    #[test]
    fn test_deadline() {
        let t0 = Instant::now();
        let mut d = Deadline::default();
        d.arm(t0, ms(150));
        assert!(!d.fire(t0 + ms(149)));
        assert!(d.fire(t0 + ms(150)));
        assert!(!d.fire(t0 + ms(300)));

        d.arm(t0, ms(150));
        assert!(d.cancel());
        assert!(!d.cancel());
        assert!(!d.fire(t0 + ms(500)));
    }

    #[test]
    fn test_debounce_leading_edge_only_for_single_call() {
        let t0 = Instant::now();
        let mut deb = Debouncer::new(ms(500));
        assert!(deb.call(t0));
        assert!(!deb.poll(t0 + ms(600)));
        // Idle again: the next call leads.
        assert!(deb.call(t0 + ms(700)));
    }

    #[test]
    fn test_debounce_burst_fires_once_trailing() {
        let t0 = Instant::now();
        let mut deb = Debouncer::new(ms(500));
        assert!(deb.call(t0));
        assert!(!deb.call(t0 + ms(100)));
        assert!(!deb.call(t0 + ms(400)));
        // Window was pushed to 900.
        assert!(!deb.poll(t0 + ms(800)));
        assert!(deb.poll(t0 + ms(900)));
        assert!(!deb.poll(t0 + ms(1000)));
    }

    #[test]
    fn test_debounce_call_after_window_leads() {
        let t0 = Instant::now();
        let mut deb = Debouncer::new(ms(500));
        assert!(deb.call(t0));
        assert!(!deb.call(t0 + ms(100)));
        // Never polled, but the window is over: this call leads and absorbs
        // the pending trailing edge.
        assert!(deb.call(t0 + ms(700)));
        assert!(!deb.has_trailing());
    }
}
