//! Provisioning button gestures.
//!
//! A press is measured between its rising and falling edge and classified
//! only once released. Presses between the two thresholds are ignored so
//! that a press near either boundary never clears credentials by accident.

use std::time::Duration;

/// Presses strictly shorter than this are a [`GestureEvent::ShortPress`].
pub const SHORT_PRESS_LIMIT: Duration = Duration::from_millis(1000);

/// Presses strictly longer than this are a [`GestureEvent::LongPress`].
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(3000);

/// Intent derived from one button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    /// Connect using stored credentials.
    ShortPress,
    /// Clear stored credentials.
    LongPress,
    /// Dead zone, no effect.
    Ignored,
}

impl GestureEvent {
    pub fn classify(held: Duration) -> Self {
        if held < SHORT_PRESS_LIMIT {
            GestureEvent::ShortPress
        } else if held > LONG_PRESS_THRESHOLD {
            GestureEvent::LongPress
        } else {
            GestureEvent::Ignored
        }
    }
}

/// Edge detector turning sampled button levels into gestures.
#[derive(Debug, Clone, Default)]
pub struct ButtonTracker {
    pressed_at_ms: Option<u64>,
}

impl ButtonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. Yields a gesture on the falling edge.
    pub fn sample(&mut self, pressed: bool, now_ms: u64) -> Option<GestureEvent> {
        match (pressed, self.pressed_at_ms) {
            (true, None) => {
                self.pressed_at_ms = Some(now_ms);
                None
            }
            (false, Some(start)) => {
                self.pressed_at_ms = None;
                let held = Duration::from_millis(now_ms.saturating_sub(start));
                Some(GestureEvent::classify(held))
            }
            _ => None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.pressed_at_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(GestureEvent::classify(ms(0)), GestureEvent::ShortPress);
        assert_eq!(GestureEvent::classify(ms(999)), GestureEvent::ShortPress);
        assert_eq!(GestureEvent::classify(ms(1000)), GestureEvent::Ignored);
        assert_eq!(GestureEvent::classify(ms(2000)), GestureEvent::Ignored);
        assert_eq!(GestureEvent::classify(ms(3000)), GestureEvent::Ignored);
        assert_eq!(GestureEvent::classify(ms(3001)), GestureEvent::LongPress);
    }

    #[test]
    fn test_tracker_fires_on_release_only() {
        let mut tracker = ButtonTracker::new();
        assert_eq!(tracker.sample(false, 0), None);
        assert_eq!(tracker.sample(true, 100), None);
        assert!(tracker.is_held());
        // Holding past the long threshold does nothing until release.
        assert_eq!(tracker.sample(true, 5000), None);
        assert_eq!(tracker.sample(false, 5000), Some(GestureEvent::LongPress));
        assert!(!tracker.is_held());
        assert_eq!(tracker.sample(false, 5010), None);
    }

    #[test]
    fn test_tracker_one_event_per_press() {
        let mut tracker = ButtonTracker::new();
        tracker.sample(true, 1_000);
        assert_eq!(tracker.sample(false, 1_999), Some(GestureEvent::ShortPress));

        tracker.sample(true, 10_000);
        assert_eq!(tracker.sample(false, 11_500), Some(GestureEvent::Ignored));
    }
}
