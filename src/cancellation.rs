use crate::backend::SpeakError;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared switchboard between the controller thread and one utterance worker:
/// cancellation, pause requests, and whether the unit has run to completion.
#[derive(Clone, Debug, Default)]
pub struct UtteranceControl {
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl UtteranceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Still able to produce audio: neither cancelled nor finished.
    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }

    pub fn check_cancelled(&self) -> Result<(), SpeakError> {
        if self.is_cancelled() {
            return Err(SpeakError::Canceled);
        }
        Ok(())
    }

    /// Sleep for `delay` in short slices, bailing out once cancelled.
    pub fn sleep(&self, delay: Duration) -> Result<(), SpeakError> {
        let deadline = Instant::now() + delay;
        loop {
            self.check_cancelled()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn poll_interval() -> Duration {
        POLL_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_through_clones() {
        let control = UtteranceControl::new();
        let worker = control.clone();
        assert!(worker.is_live());
        control.cancel();
        assert!(!worker.is_live());
        assert_eq!(worker.check_cancelled(), Err(SpeakError::Canceled));
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let control = UtteranceControl::new();
        control.cancel();
        let started = Instant::now();
        assert_eq!(control.sleep(Duration::from_secs(5)), Err(SpeakError::Canceled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn finished_units_are_not_live() {
        let control = UtteranceControl::new();
        control.set_paused(true);
        assert!(control.is_paused());
        control.mark_finished();
        assert!(!control.is_live());
    }
}
