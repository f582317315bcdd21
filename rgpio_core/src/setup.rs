//! Builds devices from configuration.
//!
//! Setup never fails as a whole. A device whose configuration is invalid or whose pins
//! cannot be acquired is logged and left out; every other device is still built.
use crate::config::{
    check_channel_count, BinarySensorConfig, ConfigError, LightConfig, PlatformConfig,
    SwitchConfig,
};
use crate::device::{BinarySensor, Device, DeviceId, RgbLight, Switch};
use crate::pin::{AcquireError, PinClient};
use log::{info, warn};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Acquire(#[from] AcquireError),
}

/// A configured device that was left out.
#[derive(Debug)]
pub struct SkippedDevice {
    pub id: DeviceId,
    pub reason: SetupError,
}

/// Devices handed to the platform.
#[derive(Default)]
pub struct Devices {
    pub lights: Vec<RgbLight>,
    pub switches: Vec<Switch>,
    pub binary_sensors: Vec<BinarySensor>,
    pub skipped: Vec<SkippedDevice>,
    seen: HashSet<DeviceId>,
}

impl Devices {
    pub fn len(&self) -> usize {
        self.lights.len() + self.switches.len() + self.binary_sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Device> {
        self.lights
            .iter()
            .map(|light| light as &dyn Device)
            .chain(self.switches.iter().map(|switch| switch as &dyn Device))
            .chain(
                self.binary_sensors
                    .iter()
                    .map(|sensor| sensor as &dyn Device),
            )
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn Device> {
        self.lights
            .iter_mut()
            .map(|light| light as &mut dyn Device)
            .chain(self.switches.iter_mut().map(|switch| switch as &mut dyn Device))
            .chain(
                self.binary_sensors
                    .iter_mut()
                    .map(|sensor| sensor as &mut dyn Device),
            )
    }

    pub fn light_mut(&mut self, id: &DeviceId) -> Option<&mut RgbLight> {
        self.lights.iter_mut().find(|light| light.id() == id)
    }

    pub fn switch_mut(&mut self, id: &DeviceId) -> Option<&mut Switch> {
        self.switches.iter_mut().find(|switch| switch.id() == id)
    }

    pub fn binary_sensor_mut(&mut self, id: &DeviceId) -> Option<&mut BinarySensor> {
        self.binary_sensors
            .iter_mut()
            .find(|sensor| sensor.id() == id)
    }

    fn skip<E: Into<SetupError>>(&mut self, id: &DeviceId, reason: E) {
        let reason = reason.into();
        warn!("Skipping device '{}': {}", id, reason);
        self.skipped.push(SkippedDevice {
            id: id.clone(),
            reason,
        });
    }

    /// Reserve `id`, skipping the device when the name is already taken.
    fn reserve(&mut self, id: &DeviceId) -> bool {
        if self.seen.insert(id.clone()) {
            true
        } else {
            self.skip(id, ConfigError::DuplicateId(id.clone()));
            false
        }
    }

    pub fn add_lights(&mut self, config: &LightConfig, client: &PinClient) {
        let host = config.remote_host();
        for (id, pins) in &config.ports {
            if !self.reserve(id) {
                continue;
            }
            if let Err(err) = config
                .validate()
                .and_then(|()| check_channel_count(id, pins.len()))
            {
                self.skip(id, err);
                continue;
            }
            // Already acquired channels are released when a later one fails.
            let channels = pins
                .iter()
                .map(|pin| {
                    client.acquire_pwm_output(&host, *pin, config.invert_logic, config.frequency)
                })
                .collect::<Result<Vec<_>, _>>();
            let light = match channels {
                Ok(channels) => RgbLight::try_new(id.clone(), channels),
                Err(err) => {
                    self.skip(id, err);
                    continue;
                }
            };
            match light {
                Ok(light) => {
                    info!("Light '{}' ready on '{}'", id, host);
                    self.lights.push(light);
                }
                Err(err) => self.skip(id, err),
            }
        }
    }

    pub fn add_switches(&mut self, config: &SwitchConfig, client: &PinClient) {
        let host = config.remote_host();
        for (pin, id) in &config.ports {
            if !self.reserve(id) {
                continue;
            }
            if let Err(err) = config.validate() {
                self.skip(id, err);
                continue;
            }
            match client.acquire_output(&host, *pin, config.invert_logic) {
                Ok(output) => {
                    info!("Switch '{}' ready on '{}'", id, host);
                    self.switches.push(Switch::new(id.clone(), output));
                }
                Err(err) => self.skip(id, err),
            }
        }
    }

    pub fn add_binary_sensors(&mut self, config: &BinarySensorConfig, client: &PinClient) {
        let host = config.remote_host();
        for (pin, id) in &config.ports {
            if !self.reserve(id) {
                continue;
            }
            let pull = match config.validate().and_then(|()| config.pull()) {
                Ok(pull) => pull,
                Err(err) => {
                    self.skip(id, err);
                    continue;
                }
            };
            match client.open_input(&host, *pin, pull, config.bouncetime, config.invert_logic) {
                Ok(input) => {
                    info!("Binary sensor '{}' ready on '{}'", id, host);
                    self.binary_sensors
                        .push(BinarySensor::new(id.clone(), input));
                }
                Err(err) => self.skip(id, err),
            }
        }
    }
}

/// Build every configured device that can be built.
pub fn setup_platform(config: &PlatformConfig, client: &PinClient) -> Devices {
    let mut devices = Devices::default();
    for group in &config.lights {
        devices.add_lights(group, client);
    }
    for group in &config.switches {
        devices.add_switches(group, client);
    }
    for group in &config.binary_sensors {
        devices.add_binary_sensors(group, client);
    }
    info!(
        "Set up {} devices, skipped {}",
        devices.len(),
        devices.skipped.len()
    );
    devices
}
