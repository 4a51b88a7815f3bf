//! Runtime configuration.
//!
//! Styled like the teacher's `SchedulerConfig` builder: a chainable
//! `fn field(mut self, v: T) -> Self` per knob plus a `validate()` called
//! once at construction time.

use ringrt_core::error::{RuntimeError, RuntimeResult};

/// How often the scheduler polls for completions while draining the ready
/// queue.
///
/// Resolves the "exact default of `event_interval`" open question: the
/// source sets this to `Max` explicitly for batch-dominated benchmarks,
/// implying a small default otherwise. We pick 61 (a prime, so it doesn't
/// resonate with common power-of-two batch sizes) as the default — see
/// `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventInterval {
    /// Check for completions every `n` ready-queue resumes.
    Every(u32),
    /// Never interleave a completion check into a ready-queue drain; only
    /// poll when the ready queue is empty.
    Max,
}

impl Default for EventInterval {
    fn default() -> Self {
        EventInterval::Every(61)
    }
}

/// Immutable runtime configuration, built via chained setters.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub(crate) sq_size: u32,
    pub(crate) enable_iopoll: bool,
    pub(crate) enable_sqpoll: bool,
    pub(crate) event_interval: EventInterval,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            sq_size: 256,
            enable_iopoll: false,
            enable_sqpoll: false,
            event_interval: EventInterval::default(),
        }
    }
}

impl RuntimeOptions {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submission queue depth. Must be a power of two; validated in
    /// [`RuntimeOptions::validate`].
    pub fn sq_size(mut self, sq_size: u32) -> Self {
        self.sq_size = sq_size;
        self
    }

    /// Enable `IORING_SETUP_IOPOLL` (busy-polling completions; requires
    /// `O_DIRECT` file descriptors).
    pub fn enable_iopoll(mut self, enable: bool) -> Self {
        self.enable_iopoll = enable;
        self
    }

    /// Enable `IORING_SETUP_SQPOLL` (kernel-side submission-queue poller
    /// thread).
    pub fn enable_sqpoll(mut self, enable: bool) -> Self {
        self.enable_sqpoll = enable;
        self
    }

    /// How often the scheduler checks for completions during a ready-queue
    /// drain.
    pub fn event_interval(mut self, interval: EventInterval) -> Self {
        self.event_interval = interval;
        self
    }

    /// Validate the configuration before it touches the ring.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.sq_size == 0 || !self.sq_size.is_power_of_two() {
            return Err(RuntimeError::InvalidOptions(
                "sq_size must be a nonzero power of two",
            ));
        }
        if let EventInterval::Every(0) = self.event_interval {
            return Err(RuntimeError::InvalidOptions(
                "event_interval must be at least 1, or EventInterval::Max",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(RuntimeOptions::new().validate().is_ok());
    }

    #[test]
    fn non_power_of_two_sq_size_rejected() {
        let opts = RuntimeOptions::new().sq_size(100);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn zero_event_interval_rejected() {
        let opts = RuntimeOptions::new().event_interval(EventInterval::Every(0));
        assert!(opts.validate().is_err());
    }

    #[test]
    fn max_event_interval_is_valid() {
        let opts = RuntimeOptions::new().event_interval(EventInterval::Max);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn builder_chains() {
        let opts = RuntimeOptions::new()
            .sq_size(512)
            .enable_iopoll(true)
            .enable_sqpoll(true)
            .event_interval(EventInterval::Every(16));
        assert_eq!(opts.sq_size, 512);
        assert!(opts.enable_iopoll);
        assert!(opts.enable_sqpoll);
        assert_eq!(opts.event_interval, EventInterval::Every(16));
    }
}
