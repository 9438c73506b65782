use std::time::{Duration, Instant};

use log::warn;

/// Warning emitter that collapses a burst of identical conditions into at most
/// one log line per interval, reporting how many occurrences it covered.
#[derive(Debug)]
pub struct ThrottledWarning {
    message: &'static str,
    interval: Duration,
    last_emit: Option<Instant>,
    pending: usize,
}

impl ThrottledWarning {
    pub fn new(message: &'static str, interval: Duration) -> Self {
        Self {
            message,
            interval,
            last_emit: None,
            pending: 0,
        }
    }

    /// Records `count` occurrences and logs if the interval has elapsed.
    pub fn record(&mut self, count: usize) {
        if let Some(total) = self.tally(count, Instant::now()) {
            warn!("{} ({} samples discarded)", self.message, total);
        }
    }

    /// Adds occurrences and returns the total to report when a warning is due.
    pub fn tally(&mut self, count: usize, now: Instant) -> Option<usize> {
        if count == 0 {
            return None;
        }
        self.pending += count;
        let due = match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last_emit = Some(now);
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_reported_immediately() {
        let mut throttle = ThrottledWarning::new("test", Duration::from_secs(1));
        assert_eq!(throttle.tally(3, Instant::now()), Some(3));
    }

    #[test]
    fn occurrences_within_interval_are_accumulated() {
        let mut throttle = ThrottledWarning::new("test", Duration::from_secs(1));
        let start = Instant::now();
        assert_eq!(throttle.tally(1, start), Some(1));
        assert_eq!(throttle.tally(4, start + Duration::from_millis(100)), None);
        assert_eq!(throttle.tally(2, start + Duration::from_millis(500)), None);
        assert_eq!(throttle.tally(1, start + Duration::from_secs(2)), Some(7));
    }

    #[test]
    fn zero_count_never_reports() {
        let mut throttle = ThrottledWarning::new("test", Duration::from_secs(1));
        assert_eq!(throttle.tally(0, Instant::now()), None);
    }
}
