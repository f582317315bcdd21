//! In-memory pin-control daemon for prototyping and tests.
//!
//! Every connection made through a [`DummyConnector`] shares one recorded daemon state,
//! so a clone of the connector can inspect the pin traffic of handles it handed out.
use crate::hardware::{Command, Connector, GpioState, HardwareError, PinTransport, RemoteHost};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Highest GPIO number the dummy daemon accepts.
const MAX_PIN: u32 = 53;
/// Longest glitch filter the dummy daemon accepts, in microseconds.
const MAX_STEADY_US: u32 = 300_000;
const PI_BAD_FILTER: i32 = -125;

#[derive(Debug, Default)]
struct DaemonState {
    commands: Vec<(RemoteHost, Command)>,
    inputs: HashMap<u32, GpioState>,
    pwm_ranges: HashMap<u32, u32>,
    unreachable: HashSet<String>,
    rejected_pins: HashSet<u32>,
    no_glitch_filter: bool,
    broken: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DummyConnector {
    state: Arc<Mutex<DaemonState>>,
}

impl DummyConnector {
    pub fn new() -> Self {
        DummyConnector::default()
    }

    fn lock(&self) -> MutexGuard<'_, DaemonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse connections to `address`.
    pub fn set_unreachable(&self, address: &str) {
        self.lock().unreachable.insert(address.into());
    }

    /// Answer every command on `pin` with a bad-pin error.
    pub fn reject_pin(&self, pin: u32) {
        self.lock().rejected_pins.insert(pin);
    }

    /// Reject glitch filter (debounce) requests.
    pub fn disable_glitch_filter(&self) {
        self.lock().no_glitch_filter = true;
    }

    /// Fail every following command as if the connection dropped.
    pub fn set_broken(&self, broken: bool) {
        self.lock().broken = broken;
    }

    /// Electrical level reported for reads of `pin`.
    pub fn set_input(&self, pin: u32, state: GpioState) {
        self.lock().inputs.insert(pin, state);
    }

    pub fn commands(&self) -> Vec<(RemoteHost, Command)> {
        self.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    /// Duty cycles written to `pin`, as fractions of its PWM range.
    pub fn pwm_levels(&self, pin: u32) -> Vec<f64> {
        let state = self.lock();
        let range = state.pwm_ranges.get(&pin).copied().unwrap_or(255);
        state
            .commands
            .iter()
            .filter_map(|(_, command)| match *command {
                Command::SetDutyCycle { pin: p, duty } if p == pin => {
                    Some(f64::from(duty) / f64::from(range))
                }
                _ => None,
            })
            .collect()
    }

    /// Levels written to `pin` as a plain output.
    pub fn output_states(&self, pin: u32) -> Vec<GpioState> {
        self.lock()
            .commands
            .iter()
            .filter_map(|(_, command)| match *command {
                Command::Write { pin: p, state } if p == pin => Some(state),
                _ => None,
            })
            .collect()
    }
}

impl Connector for DummyConnector {
    fn connect(&self, host: &RemoteHost) -> Result<Box<dyn PinTransport>, HardwareError> {
        if self.lock().unreachable.contains(&host.address) {
            return Err(HardwareError::Connect {
                host: host.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "dummy host is down"),
            });
        }
        Ok(Box::new(DummyTransport {
            host: host.clone(),
            daemon: self.clone(),
        }))
    }
}

struct DummyTransport {
    host: RemoteHost,
    daemon: DummyConnector,
}

impl PinTransport for DummyTransport {
    fn execute(&mut self, command: Command) -> Result<u32, HardwareError> {
        let mut state = self.daemon.lock();
        if state.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "dummy connection lost").into());
        }
        let pin = command.pin();
        if pin > MAX_PIN || state.rejected_pins.contains(&pin) {
            return Err(HardwareError::BadPin(pin));
        }
        if let Command::SetGlitchFilter { steady_us, .. } = command {
            if state.no_glitch_filter || steady_us > MAX_STEADY_US {
                return Err(HardwareError::Daemon {
                    command,
                    code: PI_BAD_FILTER,
                });
            }
        }
        state.commands.push((self.host.clone(), command));
        match command {
            Command::Read { pin } => {
                let level = state.inputs.get(&pin).copied().unwrap_or(GpioState::Low);
                Ok(u32::from(bool::from(level)))
            }
            Command::SetPwmRange { pin, range } => {
                state.pwm_ranges.insert(pin, range);
                Ok(range)
            }
            Command::SetPwmFrequency { frequency_hz, .. } => Ok(frequency_hz),
            _ => Ok(0),
        }
    }
}
