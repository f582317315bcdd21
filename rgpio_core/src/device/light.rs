//! RGB light driven by three PWM pins.
//!
//! The level of each channel is the product of its color component and the brightness,
//! both scaled to `[0.0, 1.0]`. Turning the light off only darkens the pins: brightness and
//! color stay cached, so the next plain turn on restores the previous look.
use crate::config::{ConfigError, RGB_CHANNELS};
use crate::device::{Device, DeviceId, DeviceState, Notifier, StateObserver};
use crate::pin::PwmOutput;
use log::warn;
use serde::{Deserialize, Serialize};

/// Overrides applied by [`RgbLight::turn_on`]; absent fields keep the cached value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOnOptions {
    pub brightness: Option<u8>,
    pub color: Option<[u8; 3]>,
}

impl TurnOnOptions {
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }
}

pub struct RgbLight {
    id: DeviceId,
    /// Red, green, blue.
    channels: [PwmOutput; RGB_CHANNELS],
    is_on: bool,
    brightness: u8,
    color: [u8; 3],
    available: bool,
    notifier: Notifier,
}

impl RgbLight {
    /// Build a light from exactly three PWM handles in R, G, B order.
    pub fn try_new(id: DeviceId, channels: Vec<PwmOutput>) -> Result<Self, ConfigError> {
        let got = channels.len();
        let channels: [PwmOutput; RGB_CHANNELS] =
            channels.try_into().map_err(|_| ConfigError::ChannelCount {
                device: id.clone(),
                expected: RGB_CHANNELS,
                got,
            })?;
        Ok(RgbLight {
            id,
            channels,
            is_on: false,
            brightness: 255,
            color: [255, 255, 255],
            available: true,
            notifier: Notifier::default(),
        })
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    /// Channel levels for the cached brightness and color.
    pub fn levels(&self) -> [f64; 3] {
        channel_levels(self.brightness, self.color)
    }

    /// Overrides are only cached once every channel accepted the new levels.
    pub fn turn_on(&mut self, options: TurnOnOptions) {
        let brightness = options.brightness.unwrap_or(self.brightness);
        let color = options.color.unwrap_or(self.color);
        if self.write_levels(channel_levels(brightness, color)) {
            self.brightness = brightness;
            self.color = color;
            self.is_on = true;
            self.notify();
        }
    }

    pub fn turn_off(&mut self) {
        if self.write_levels([0.0; 3]) {
            self.is_on = false;
            self.notify();
        }
    }

    /// Writes every channel, in order, even when an earlier one failed.
    fn write_levels(&mut self, levels: [f64; 3]) -> bool {
        let failed = self
            .channels
            .iter_mut()
            .zip(levels)
            .map(|(channel, level)| channel.write(level))
            .filter(|delivery| delivery.is_failed())
            .count();
        self.available = failed == 0;
        if !self.available {
            warn!(
                "Light '{}': {} of 3 channel writes failed, state unchanged",
                self.id, failed
            );
        }
        self.available
    }

    fn notify(&mut self) {
        let state = self.state();
        self.notifier.notify(&self.id, &state);
    }
}

fn channel_levels(brightness: u8, color: [u8; 3]) -> [f64; 3] {
    let brightness = f64::from(brightness) / 255.0;
    color.map(|component| f64::from(component) / 255.0 * brightness)
}

impl Device for RgbLight {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn state(&self) -> DeviceState {
        DeviceState::Light {
            is_on: self.is_on,
            brightness: self.brightness,
            color: self.color,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn assumed_state(&self) -> bool {
        true
    }

    fn set_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.notifier.set(observer);
    }
}
