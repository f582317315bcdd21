use crate::hardware::{Command, Direction, HardwareError, PullMode, RemoteHost};
use crate::pin::{AcquireError, RemotePin};
use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Longest glitch filter pigpiod accepts, in microseconds.
pub const MAX_GLITCH_FILTER_US: u32 = 300_000;

/// Remote digital input.
///
/// The daemon's glitch filter only applies to level change reports, a plain read returns
/// the raw level. [`Input::read`] therefore debounces on its own: after an accepted level
/// change, further changes are held back until the bounce time has passed.
pub struct Input {
    line: RemotePin,
    invert_logic: bool,
    pull: PullMode,
    bounce_time: Duration,
    /// Last accepted electrical level and when it changed.
    settled: Option<(bool, Option<Instant>)>,
}

impl Input {
    pub(crate) fn try_new(
        mut line: RemotePin,
        pull: PullMode,
        bounce_time_ms: u64,
        invert_logic: bool,
    ) -> Result<Self, AcquireError> {
        let pin = line.pin();
        line.execute(Command::SetMode {
            pin,
            direction: Direction::Input,
        })
        .map_err(|err| line.rejected(err))?;
        line.execute(Command::SetPull { pin, pull })
            .map_err(|err| line.rejected(err))?;
        if bounce_time_ms > 0 {
            let requested_us =
                u32::try_from(bounce_time_ms.saturating_mul(1000)).unwrap_or(u32::MAX);
            if requested_us > MAX_GLITCH_FILTER_US {
                warn!(
                    "Pin {} on '{}': bounce time {} ms exceeds the daemon glitch filter, using {} us",
                    pin,
                    line.host(),
                    bounce_time_ms,
                    MAX_GLITCH_FILTER_US
                );
            }
            let steady_us = requested_us.min(MAX_GLITCH_FILTER_US);
            line.execute(Command::SetGlitchFilter { pin, steady_us })
                .map_err(|source| AcquireError::Debounce {
                    host: line.host().clone(),
                    pin,
                    source,
                })?;
        }
        Ok(Input {
            line,
            invert_logic,
            pull,
            bounce_time: Duration::from_millis(bounce_time_ms),
            settled: None,
        })
    }

    pub fn pin(&self) -> u32 {
        self.line.pin()
    }

    pub fn host(&self) -> &RemoteHost {
        self.line.host()
    }

    pub fn pull(&self) -> PullMode {
        self.pull
    }

    /// Live read of the debounced level, `None` when the daemon could not be queried.
    pub fn read(&mut self) -> Option<bool> {
        match self.read_raw() {
            Ok(high) => Some(self.debounce(high, Instant::now()) != self.invert_logic),
            Err(err) => {
                warn!(
                    "Failed reading input pin {} on '{}': {}",
                    self.pin(),
                    self.host(),
                    err
                );
                None
            }
        }
    }

    fn debounce(&mut self, high: bool, now: Instant) -> bool {
        match self.settled {
            Some((level, _)) if level == high => level,
            Some((level, Some(changed))) if now.duration_since(changed) < self.bounce_time => {
                debug!("Pin {} on '{}': bounce ignored", self.pin(), self.host());
                level
            }
            Some(_) => {
                self.settled = Some((high, Some(now)));
                high
            }
            None => {
                self.settled = Some((high, None));
                high
            }
        }
    }

    fn read_raw(&mut self) -> Result<bool, HardwareError> {
        let pin = self.line.pin();
        Ok(self.line.execute(Command::Read { pin })? != 0)
    }
}

impl ErrorType for Input {
    type Error = HardwareError;
}

/// Raw electrical levels, neither `invert_logic` nor debouncing apply.
impl InputPin for Input {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read_raw()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_raw()?)
    }
}
