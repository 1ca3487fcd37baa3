//! Hysteresis alarms with LED indicators.
//!
//! An alarm raises when the metric crosses its threshold and clears only
//! once the metric falls below `threshold − margin`, so a reading that
//! rides the threshold cannot chatter the indicator. LEDs are written on
//! transitions only.

use iiot_hal::gpio::{write_pin, GpioModule, Level};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Inactive,
    Active,
}

/// Threshold comparator with a deadband below the threshold.
#[derive(Debug)]
pub struct HysteresisAlarm {
    threshold: i32,
    margin: i32,
    state: AlarmState,
}

impl HysteresisAlarm {
    pub fn new(threshold: i32, margin: i32) -> Self {
        Self {
            threshold,
            margin,
            state: AlarmState::Inactive,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Feed one reading. Returns the new state only on a transition.
    pub fn evaluate(&mut self, metric: i32) -> Option<AlarmState> {
        let next = match self.state {
            AlarmState::Inactive if metric >= self.threshold => AlarmState::Active,
            AlarmState::Active if metric < self.threshold - self.margin => AlarmState::Inactive,
            current => current,
        };
        if next != self.state {
            self.state = next;
            Some(next)
        } else {
            None
        }
    }
}

/// An alarm bound to its indicator LED.
pub struct AlarmIndicator {
    name: &'static str,
    alarm: HysteresisAlarm,
    pin: u8,
}

impl AlarmIndicator {
    pub fn new(name: &'static str, threshold: i32, margin: i32, pin: u8) -> Self {
        Self {
            name,
            alarm: HysteresisAlarm::new(threshold, margin),
            pin,
        }
    }

    /// Evaluate the metric and drive the LED if the alarm transitioned.
    ///
    /// A failed GPIO write leaves the alarm state advanced; the LED
    /// catches up on the next transition.
    pub fn update(&mut self, gpio: &dyn GpioModule, metric: i32) {
        match self.alarm.evaluate(metric) {
            Some(AlarmState::Active) => {
                warn!(alarm = self.name, metric, "alarm raised");
                if let Err(e) = write_pin(gpio, self.pin, Level::High) {
                    warn!(alarm = self.name, pin = self.pin, error = %e, "indicator write failed");
                }
            }
            Some(AlarmState::Inactive) => {
                info!(alarm = self.name, metric, "alarm cleared");
                if let Err(e) = write_pin(gpio, self.pin, Level::Low) {
                    warn!(alarm = self.name, pin = self.pin, error = %e, "indicator write failed");
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiot_hal::sim::SimBoard;

    #[test]
    fn raises_at_threshold() {
        let mut alarm = HysteresisAlarm::new(78, 5);
        assert_eq!(alarm.evaluate(77), None);
        assert_eq!(alarm.evaluate(78), Some(AlarmState::Active));
    }

    #[test]
    fn holds_inside_deadband() {
        let mut alarm = HysteresisAlarm::new(78, 5);
        alarm.evaluate(80);
        // 74 is below threshold but inside the 5-degree margin.
        assert_eq!(alarm.evaluate(74), None);
        assert_eq!(alarm.state(), AlarmState::Active);
    }

    #[test]
    fn clears_below_deadband() {
        let mut alarm = HysteresisAlarm::new(78, 5);
        alarm.evaluate(90);
        assert_eq!(alarm.evaluate(73), None);
        assert_eq!(alarm.evaluate(72), Some(AlarmState::Inactive));
    }

    #[test]
    fn no_repeat_transitions() {
        let mut alarm = HysteresisAlarm::new(60, 20);
        assert_eq!(alarm.evaluate(60), Some(AlarmState::Active));
        assert_eq!(alarm.evaluate(95), None);
        assert_eq!(alarm.evaluate(39), Some(AlarmState::Inactive));
        assert_eq!(alarm.evaluate(10), None);
    }

    #[test]
    fn noisy_oscillation_around_threshold_cannot_chatter() {
        let mut alarm = HysteresisAlarm::new(78, 5);
        // Monotonic ramp in: exactly one transition, at the threshold.
        let mut transitions = 0;
        for metric in 70..=82 {
            if alarm.evaluate(metric).is_some() {
                transitions += 1;
                assert_eq!(metric, 78);
            }
        }
        assert_eq!(transitions, 1);

        // Noise oscillating across the threshold but inside the deadband.
        for i in 0..100 {
            let metric = if i % 2 == 0 { 76 } else { 80 };
            assert_eq!(alarm.evaluate(metric), None);
        }
        assert_eq!(alarm.state(), AlarmState::Active);
    }

    #[test]
    fn indicator_writes_only_on_transition() {
        let board = SimBoard::new();
        let gpio = board.gpio();
        let mut ind = AlarmIndicator::new("temperature", 78, 5, 45);

        ind.update(&gpio, 70);
        ind.update(&gpio, 75);
        assert_eq!(board.gpio_write_count(45), 0);

        ind.update(&gpio, 80);
        assert_eq!(board.gpio_level(45), Some(true));
        assert_eq!(board.gpio_write_count(45), 1);

        // Stays high without rewriting while in the deadband.
        ind.update(&gpio, 85);
        ind.update(&gpio, 74);
        assert_eq!(board.gpio_write_count(45), 1);

        ind.update(&gpio, 60);
        assert_eq!(board.gpio_level(45), Some(false));
        assert_eq!(board.gpio_write_count(45), 2);
    }
}
