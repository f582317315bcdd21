//! Transport towards the remote pin-control daemon.
//!
//! Pins are not driven locally. Every pin operation is a [`Command`] sent to a daemon
//! (pigpiod) running on the single-board computer that owns the GPIO header.
//! The daemon protocol lives behind the [`PinTransport`] and [`Connector`] traits,
//! so the rest of the crate never sees a socket.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod dummy;
pub mod pigpiod;

/// Port pigpiod listens on unless told otherwise.
pub const DEFAULT_DAEMON_PORT: u16 = 8888;

/// Network address of one pin-control daemon.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHost {
    pub address: String,
    pub port: u16,
}

impl RemoteHost {
    pub fn new<T: Into<String>>(address: T, port: u16) -> Self {
        RemoteHost {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Could not connect to '{host}': {source}")]
    Connect {
        host: RemoteHost,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GPIO {0} is not a valid pin on the remote host")]
    BadPin(u32),
    #[error("GPIO {0} may not be used from a remote client")]
    NotPermitted(u32),
    #[error("Daemon rejected {command:?} with code {code}")]
    Daemon { command: Command, code: i32 },
    #[error("Malformed daemon response: {0}")]
    Response(String),
}

impl embedded_hal::digital::Error for HardwareError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for HardwareError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioState {
    Low,
    High,
}

impl From<GpioState> for bool {
    fn from(state: GpioState) -> Self {
        match state {
            GpioState::High => true,
            GpioState::Low => false,
        }
    }
}

impl From<bool> for GpioState {
    fn from(high: bool) -> Self {
        if high {
            GpioState::High
        } else {
            GpioState::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Electrical bias applied to an unconnected input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

/// Only `"UP"` and `"DOWN"` are pull modes, anything else is rejected.
impl TryFrom<&str> for PullMode {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "UP" => Ok(PullMode::Up),
            "DOWN" => Ok(PullMode::Down),
            _ => Err(String::from(value)),
        }
    }
}

/// Single request understood by the pin-control daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode { pin: u32, direction: Direction },
    SetPull { pin: u32, pull: PullMode },
    /// Level changes shorter than `steady_us` are not reported.
    SetGlitchFilter { pin: u32, steady_us: u32 },
    SetPwmFrequency { pin: u32, frequency_hz: u32 },
    SetPwmRange { pin: u32, range: u32 },
    Write { pin: u32, state: GpioState },
    SetDutyCycle { pin: u32, duty: u32 },
    Read { pin: u32 },
}

impl Command {
    pub fn pin(&self) -> u32 {
        match *self {
            Command::SetMode { pin, .. }
            | Command::SetPull { pin, .. }
            | Command::SetGlitchFilter { pin, .. }
            | Command::SetPwmFrequency { pin, .. }
            | Command::SetPwmRange { pin, .. }
            | Command::Write { pin, .. }
            | Command::SetDutyCycle { pin, .. }
            | Command::Read { pin } => pin,
        }
    }
}

/// Live connection to one remote daemon.
pub trait PinTransport: Send {
    /// Send one command and block until the daemon answers.
    ///
    /// Returns the non-negative result word of the command
    /// (the level for [`Command::Read`], the applied frequency for
    /// [`Command::SetPwmFrequency`], zero for most others).
    fn execute(&mut self, command: Command) -> Result<u32, HardwareError>;
}

/// Opens connections to remote daemons.
pub trait Connector {
    fn connect(&self, host: &RemoteHost) -> Result<Box<dyn PinTransport>, HardwareError>;
}
