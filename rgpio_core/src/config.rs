//! Device group configuration.
//!
//! Each device kind owns its config struct. Field names and defaults follow the
//! configuration keys users already write for remote Raspberry Pi GPIO groups.
use crate::device::DeviceId;
use crate::hardware::{PullMode, RemoteHost, DEFAULT_DAEMON_PORT};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const DEFAULT_INVERT_LOGIC: bool = false;
pub const DEFAULT_FREQUENCY: u32 = 10_000;
pub const DEFAULT_PULL_MODE: &str = "UP";
pub const DEFAULT_BOUNCETIME: u64 = 50;

fn default_port() -> u16 {
    DEFAULT_DAEMON_PORT
}

fn default_invert_logic() -> bool {
    DEFAULT_INVERT_LOGIC
}

fn default_frequency() -> u32 {
    DEFAULT_FREQUENCY
}

fn default_pull_mode() -> String {
    String::from(DEFAULT_PULL_MODE)
}

fn default_bouncetime() -> u64 {
    DEFAULT_BOUNCETIME
}

/// PWM RGB lights on one remote host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Light name to its (red, green, blue) pins.
    pub ports: BTreeMap<DeviceId, Vec<u32>>,
    #[serde(default = "default_invert_logic")]
    pub invert_logic: bool,
    /// PWM frequency in Hz.
    #[serde(default = "default_frequency")]
    pub frequency: u32,
}

impl LightConfig {
    pub fn remote_host(&self) -> RemoteHost {
        RemoteHost::new(self.host.clone(), self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_host(&self.host)?;
        if self.frequency == 0 {
            return Err(ConfigError::Frequency);
        }
        Ok(())
    }
}

/// On/off outputs on one remote host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SwitchConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pin number to switch name.
    pub ports: BTreeMap<u32, DeviceId>,
    #[serde(default = "default_invert_logic")]
    pub invert_logic: bool,
}

impl SwitchConfig {
    pub fn remote_host(&self) -> RemoteHost {
        RemoteHost::new(self.host.clone(), self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_host(&self.host)
    }
}

/// Digital inputs on one remote host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BinarySensorConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pin number to sensor name.
    pub ports: BTreeMap<u32, DeviceId>,
    #[serde(default = "default_invert_logic")]
    pub invert_logic: bool,
    /// `"UP"` or `"DOWN"`.
    #[serde(default = "default_pull_mode")]
    pub pull_mode: String,
    /// Debounce time in milliseconds.
    #[serde(default = "default_bouncetime")]
    pub bouncetime: u64,
}

impl BinarySensorConfig {
    pub fn remote_host(&self) -> RemoteHost {
        RemoteHost::new(self.host.clone(), self.port)
    }

    pub fn pull(&self) -> Result<PullMode, ConfigError> {
        PullMode::try_from(self.pull_mode.as_str()).map_err(ConfigError::PullMode)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_host(&self.host)?;
        self.pull().map(|_| ())
    }
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.trim().is_empty() {
        Err(ConfigError::EmptyHost)
    } else {
        Ok(())
    }
}

/// All remote GPIO device groups handed to [`crate::setup::setup_platform`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PlatformConfig {
    #[serde(default)]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub binary_sensors: Vec<BinarySensorConfig>,
}

impl PlatformConfig {
    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.lights
            .iter()
            .flat_map(|group| group.ports.keys())
            .chain(self.switches.iter().flat_map(|group| group.ports.values()))
            .chain(
                self.binary_sensors
                    .iter()
                    .flat_map(|group| group.ports.values()),
            )
    }

    /// Strict check of the whole configuration.
    ///
    /// Setup itself is lenient and skips invalid devices; this is for tools that want to
    /// refuse a broken config file up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = self.device_ids().duplicates().next() {
            return Err(ConfigError::DuplicateId(id.clone()));
        }
        for group in &self.lights {
            group.validate()?;
            for (id, pins) in &group.ports {
                check_channel_count(id, pins.len())?;
            }
        }
        for group in &self.switches {
            group.validate()?;
        }
        for group in &self.binary_sensors {
            group.validate()?;
        }
        Ok(())
    }
}

/// Channels of an RGB light.
pub const RGB_CHANNELS: usize = 3;

pub(crate) fn check_channel_count(id: &DeviceId, got: usize) -> Result<(), ConfigError> {
    if got == RGB_CHANNELS {
        Ok(())
    } else {
        Err(ConfigError::ChannelCount {
            device: id.clone(),
            expected: RGB_CHANNELS,
            got,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Light '{device}' needs exactly {expected} pins (RGB), got {got}")]
    ChannelCount {
        device: DeviceId,
        expected: usize,
        got: usize,
    },
    #[error("Unsupported pull mode '{0}', expected 'UP' or 'DOWN'")]
    PullMode(String),
    #[error("PWM frequency must be a positive integer")]
    Frequency,
    #[error("Host address must not be empty")]
    EmptyHost,
    #[error("Device name '{0}' is used more than once")]
    DuplicateId(DeviceId),
}
