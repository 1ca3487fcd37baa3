//! Motor speed governor.
//!
//! The primary motor tracks the operator's duty setpoint until vibration
//! crosses the override threshold. The override clamps the duty to a safe
//! ceiling, engages the auxiliary windmill fan, and holds both for a
//! fixed number of ticks past the last excursion. Commanded duty is
//! remapped through a square-root curve before it reaches the PWM so the
//! low end of the knob has usable resolution.

use tracing::{debug, info};

/// One tick's actuator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    /// Remapped duty for the primary motor [%].
    pub primary_duty: i32,
    /// Windmill engagement edge, if this tick produced one.
    pub windmill: Option<bool>,
}

#[derive(Debug)]
pub struct MotorController {
    duty_limit: i32,
    hold_duration: u32,
    hold: u32,
    windmill_engaged: bool,
}

impl MotorController {
    pub fn new(duty_limit: i32, hold_duration: u32) -> Self {
        Self {
            duty_limit,
            hold_duration,
            hold: 0,
            windmill_engaged: false,
        }
    }

    /// Whether the vibration override is currently holding the motor.
    pub fn override_active(&self) -> bool {
        self.hold > 0
    }

    /// Decide this tick's duty from the setpoint and the normalized
    /// vibration report.
    pub fn decide(&mut self, setpoint_duty: i32, vibration: i32, threshold: i32) -> MotorCommand {
        let duty;
        let mut windmill = None;

        if vibration >= threshold {
            duty = setpoint_duty.min(self.duty_limit);
            if self.hold == 0 {
                info!(vibration, threshold, "vibration override engaged");
            }
            self.hold = self.hold_duration;
            if !self.windmill_engaged {
                self.windmill_engaged = true;
                windmill = Some(true);
            }
        } else if self.hold > 0 {
            duty = setpoint_duty.min(self.duty_limit);
            self.hold -= 1;
            if self.hold == 0 {
                info!("vibration override released");
                if self.windmill_engaged {
                    self.windmill_engaged = false;
                    windmill = Some(false);
                }
            }
        } else {
            duty = setpoint_duty;
            if self.windmill_engaged {
                self.windmill_engaged = false;
                windmill = Some(false);
            }
        }

        let primary_duty = remap_duty(duty);
        debug!(setpoint_duty, duty, primary_duty, hold = self.hold, "motor decision");
        MotorCommand {
            primary_duty,
            windmill,
        }
    }
}

/// Square-root duty remap: `round(6·√duty)`.
///
/// 0 → 0, 22 → 28, 100 → 60. Inputs are already clamped non-negative.
pub fn remap_duty(duty: i32) -> i32 {
    (6.0 * f64::from(duty).sqrt()).round() as i32
}
