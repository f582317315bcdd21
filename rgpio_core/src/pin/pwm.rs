use crate::hardware::{Command, Direction, HardwareError, RemoteHost};
use crate::pin::{AcquireError, Delivery, RemotePin};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use log::warn;

/// Number of duty cycle steps configured on every PWM pin.
pub const PWM_RANGE: u32 = 10_000;

/// Remote PWM output with a continuous level in `[0.0, 1.0]`.
pub struct PwmOutput {
    line: RemotePin,
    invert_logic: bool,
    frequency_hz: u32,
}

impl PwmOutput {
    pub(crate) fn try_new(
        mut line: RemotePin,
        invert_logic: bool,
        frequency_hz: u32,
    ) -> Result<Self, AcquireError> {
        let pin = line.pin();
        line.execute(Command::SetMode {
            pin,
            direction: Direction::Output,
        })
        .map_err(|err| line.rejected(err))?;
        // The daemon picks the closest frequency it supports.
        let frequency_hz = line
            .execute(Command::SetPwmFrequency { pin, frequency_hz })
            .map_err(|err| line.rejected(err))?;
        line.execute(Command::SetPwmRange {
            pin,
            range: PWM_RANGE,
        })
        .map_err(|err| line.rejected(err))?;
        let mut pwm = PwmOutput {
            line,
            invert_logic,
            frequency_hz,
        };
        pwm.try_write(0.0).map_err(|err| pwm.line.rejected(err))?;
        Ok(pwm)
    }

    pub fn pin(&self) -> u32 {
        self.line.pin()
    }

    pub fn host(&self) -> &RemoteHost {
        self.line.host()
    }

    /// Frequency applied by the daemon.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Set the output level.
    ///
    /// Levels outside `[0.0, 1.0]` (NaN included) are ignored: nothing is sent and the
    /// pin keeps its previous level.
    pub fn write(&mut self, level: f64) -> Delivery {
        if !(0.0..=1.0).contains(&level) {
            return Delivery::Ignored;
        }
        match self.try_write(level) {
            Ok(()) => Delivery::Applied,
            Err(err) => {
                warn!(
                    "Failed writing PWM pin {} on '{}': {}",
                    self.pin(),
                    self.host(),
                    err
                );
                Delivery::Failed
            }
        }
    }

    fn try_write(&mut self, level: f64) -> Result<(), HardwareError> {
        let duty = duty_for_level(level, self.invert_logic);
        self.set_duty(duty)
    }

    fn set_duty(&mut self, duty: u32) -> Result<(), HardwareError> {
        let pin = self.line.pin();
        self.line
            .execute(Command::SetDutyCycle { pin, duty })
            .map(|_| ())
    }
}

fn duty_for_level(level: f64, invert_logic: bool) -> u32 {
    let level = if invert_logic { 1.0 - level } else { level };
    // level is within [0, 1], so the product fits the range.
    (level * f64::from(PWM_RANGE)).round() as u32
}

impl ErrorType for PwmOutput {
    type Error = HardwareError;
}

/// Raw duty cycle, `invert_logic` does not apply.
impl SetDutyCycle for PwmOutput {
    fn max_duty_cycle(&self) -> u16 {
        PWM_RANGE as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.set_duty(u32::from(duty).min(PWM_RANGE))
    }
}
