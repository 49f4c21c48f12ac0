//! RAII phase timing for the authorization pipeline.

use std::time::{Duration, Instant};

use crate::metrics::AuthorizationPhases;

/// Adds the time between creation and drop to a slot.
///
/// The slot is updated even when the timed scope exits early via `?` or
/// `return`, and across `.await` points inside that scope.
pub struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(slot: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

/// Raw durations collected while authorizing one request.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseDurations {
    pub filtered_load: Duration,
    pub evaluate: Duration,
}

impl PhaseDurations {
    pub fn into_phases(self, total: Duration) -> AuthorizationPhases {
        AuthorizationPhases {
            filtered_load_ms: ms(self.filtered_load),
            evaluate_ms: ms(self.evaluate),
            total_ms: ms(total),
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_timer_records_elapsed() {
        let mut duration = Duration::ZERO;
        {
            let _timer = PhaseTimer::new(&mut duration);
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(duration.as_millis() >= 10);
    }

    #[tokio::test]
    async fn test_phase_timer_spans_await() {
        let mut durations = PhaseDurations::default();
        {
            let _timer = PhaseTimer::new(&mut durations.evaluate);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(durations.evaluate.as_millis() >= 5);
        assert_eq!(durations.filtered_load, Duration::ZERO);
    }

    #[test]
    fn test_into_phases_converts_to_millis() {
        let durations = PhaseDurations {
            filtered_load: Duration::from_micros(1_500),
            evaluate: Duration::from_millis(2),
        };
        let phases = durations.into_phases(Duration::from_millis(4));
        assert!((phases.filtered_load_ms - 1.5).abs() < 1e-9);
        assert!((phases.evaluate_ms - 2.0).abs() < 1e-9);
        assert!((phases.overhead_ms() - 0.5).abs() < 1e-9);
    }
}
