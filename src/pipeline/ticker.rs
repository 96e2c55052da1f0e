//! Time-sliced progress messages
//!
//! While the report streams, the only feedback is a short list of canned
//! messages shown one at a time. The ticker looks at the clock and nothing
//! else; the event stream's contents never influence it.

use std::time::Duration;
use tokio::time::Instant;

pub const WRITING_UPDATES: [&str; 3] = [
    "Planning report structure...",
    "Writing sections...",
    "Finalizing report...",
];

#[derive(Debug, Clone)]
pub struct ProgressTicker {
    messages: Vec<String>,
    interval: Duration,
    last_update: Instant,
    next_message: usize,
}

impl ProgressTicker {
    pub fn new<I, S>(messages: I, interval: Duration, now: Instant) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            interval,
            last_update: now,
            next_message: 0,
        }
    }

    /// Next message if strictly more than `interval` passed since the last one
    pub fn poll(&mut self, now: Instant) -> Option<&str> {
        if self.next_message >= self.messages.len() {
            return None;
        }
        if now.saturating_duration_since(self.last_update) <= self.interval {
            return None;
        }

        self.last_update = now;
        let message = self.messages.get(self.next_message)?;
        self.next_message += 1;
        Some(message.as_str())
    }

    pub fn shown(&self) -> usize {
        self.next_message
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_message >= self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ticker(start: Instant) -> ProgressTicker {
        ProgressTicker::new(WRITING_UPDATES, Duration::from_secs(5), start)
    }

    #[test]
    fn test_nothing_before_interval() {
        let start = Instant::now();
        let mut ticker = ticker(start);

        assert_eq!(ticker.poll(start + Duration::from_secs(1)), None);
        assert_eq!(ticker.poll(start + Duration::from_secs(5)), None);
        assert_eq!(ticker.shown(), 0);
    }

    #[test]
    fn test_messages_in_order_then_exhausted() {
        let start = Instant::now();
        let mut ticker = ticker(start);

        let t1 = start + Duration::from_millis(5_001);
        assert_eq!(ticker.poll(t1), Some("Planning report structure..."));
        assert_eq!(ticker.poll(t1 + Duration::from_secs(1)), None);

        let t2 = t1 + Duration::from_secs(6);
        assert_eq!(ticker.poll(t2), Some("Writing sections..."));
        let t3 = t2 + Duration::from_secs(6);
        assert_eq!(ticker.poll(t3), Some("Finalizing report..."));

        assert!(ticker.is_exhausted());
        assert_eq!(ticker.poll(t3 + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_long_gap_shows_only_one_message() {
        let start = Instant::now();
        let mut ticker = ticker(start);

        assert!(ticker.poll(start + Duration::from_secs(100)).is_some());
        assert_eq!(ticker.shown(), 1);
    }

    proptest! {
        #[test]
        fn prop_bounded_by_list_and_by_time(gaps in prop::collection::vec(0u64..20_000, 0..200)) {
            let start = Instant::now();
            let mut ticker = ticker(start);
            let mut now = start;
            let mut shown_at = Vec::new();

            for gap in gaps {
                now += Duration::from_millis(gap);
                if ticker.poll(now).is_some() {
                    shown_at.push(now);
                }
            }

            prop_assert!(shown_at.len() <= WRITING_UPDATES.len());
            let elapsed = now.saturating_duration_since(start);
            prop_assert!(shown_at.len() as u128 <= elapsed.as_millis() / 5_001 + 1);

            let mut previous = start;
            for at in shown_at {
                prop_assert!(at.saturating_duration_since(previous) > Duration::from_secs(5));
                previous = at;
            }
        }
    }
}
