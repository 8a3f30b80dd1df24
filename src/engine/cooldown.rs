use std::time::Duration;

/// Randomized idle period between sessions, so requests never follow a
/// fixed cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownWindow {
    pub min: Duration,
    pub max: Duration,
}

impl CooldownWindow {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Uniform draw from `[min, max]` at millisecond resolution
    pub fn draw(&self) -> Duration {
        let low = self.min.as_millis() as u64;
        let high = self.max.as_millis() as u64;
        Duration::from_millis(fastrand::u64(low..=high))
    }
}

impl Default for CooldownWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(2 * 3600), Duration::from_secs(4 * 3600))
    }
}
