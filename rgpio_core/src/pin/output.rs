use crate::hardware::{Command, Direction, GpioState, HardwareError, RemoteHost};
use crate::pin::{AcquireError, Delivery, RemotePin};
use embedded_hal::digital::{ErrorType, OutputPin};
use log::warn;

/// Remote on/off output.
pub struct Output {
    line: RemotePin,
    invert_logic: bool,
}

impl Output {
    pub(crate) fn try_new(mut line: RemotePin, invert_logic: bool) -> Result<Self, AcquireError> {
        let pin = line.pin();
        line.execute(Command::SetMode {
            pin,
            direction: Direction::Output,
        })
        .map_err(|err| line.rejected(err))?;
        let mut output = Output { line, invert_logic };
        output
            .try_write(false)
            .map_err(|err| output.line.rejected(err))?;
        Ok(output)
    }

    pub fn pin(&self) -> u32 {
        self.line.pin()
    }

    pub fn host(&self) -> &RemoteHost {
        self.line.host()
    }

    pub fn write(&mut self, on: bool) -> Delivery {
        match self.try_write(on) {
            Ok(()) => Delivery::Applied,
            Err(err) => {
                warn!(
                    "Failed writing output pin {} on '{}': {}",
                    self.pin(),
                    self.host(),
                    err
                );
                Delivery::Failed
            }
        }
    }

    pub fn on(&mut self) -> Delivery {
        self.write(true)
    }

    pub fn off(&mut self) -> Delivery {
        self.write(false)
    }

    fn try_write(&mut self, on: bool) -> Result<(), HardwareError> {
        self.set_state(GpioState::from(on != self.invert_logic))
    }

    fn set_state(&mut self, state: GpioState) -> Result<(), HardwareError> {
        let pin = self.line.pin();
        self.line.execute(Command::Write { pin, state }).map(|_| ())
    }
}

impl ErrorType for Output {
    type Error = HardwareError;
}

/// Electrical levels, `invert_logic` does not apply.
impl OutputPin for Output {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_state(GpioState::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_state(GpioState::High)
    }
}
