/// Cancel-and-reschedule timer driven by explicit timestamps.
///
/// The owner calls [`Debouncer::schedule`] on every event and polls [`Debouncer::ready`] from its
/// own loop; the action fires once the quiet period has elapsed since the last event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debouncer {
    quiet_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            deadline: None,
        }
    }

    pub fn quiet_ms(&self) -> u64 {
        self.quiet_ms
    }

    /// Push the deadline out to `now + quiet`.
    pub fn schedule(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(self.quiet_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// True exactly once when the deadline has passed; disarms the timer.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(at) if now_ms >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm immediately, reporting whether something was pending.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}
