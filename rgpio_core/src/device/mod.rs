//! Devices exposed to the home-automation platform.
//!
//! A device owns the pin handles it was built from and keeps the state reported upstream.
//! Output hardware has no read-back, so lights and switches report *assumed* state: the
//! last transition that was written without a transport failure.
//!
//! Every device operation blocks for one or more round-trips to the remote daemon.
//! Platforms driven by an event loop should run them through [`crate::worker`].
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

pub mod binary_sensor;
pub mod light;
pub mod switch;

pub use binary_sensor::BinarySensor;
pub use light::{RgbLight, TurnOnOptions};
pub use switch::Switch;

/// Device name, unique across the configuration.
#[derive(
    From, Display, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct DeviceId(pub String);

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(x: &str) -> Self {
        String::from(x).into()
    }
}

/// Snapshot of a device as the platform sees it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceState {
    Light {
        is_on: bool,
        brightness: u8,
        color: [u8; 3],
    },
    Switch {
        is_on: bool,
    },
    BinarySensor {
        is_on: bool,
    },
}

impl DeviceState {
    pub fn is_on(&self) -> bool {
        match *self {
            DeviceState::Light { is_on, .. }
            | DeviceState::Switch { is_on }
            | DeviceState::BinarySensor { is_on } => is_on,
        }
    }
}

/// Receives state changes, typically to schedule a platform state update.
pub trait StateObserver: Send {
    fn state_changed(&mut self, id: &DeviceId, state: &DeviceState);
}

impl<F> StateObserver for F
where
    F: FnMut(&DeviceId, &DeviceState) + Send,
{
    fn state_changed(&mut self, id: &DeviceId, state: &DeviceState) {
        self(id, state)
    }
}

/// Common device interface
pub trait Device: Send {
    fn id(&self) -> &DeviceId;
    fn state(&self) -> DeviceState;
    /// False after the last operation could not reach the remote host.
    fn is_available(&self) -> bool;
    /// True when the state is cached intent rather than read from hardware.
    fn assumed_state(&self) -> bool;
    fn set_observer(&mut self, observer: Box<dyn StateObserver>);
}

/// Optional observer shared by all device kinds.
#[derive(Default)]
pub(crate) struct Notifier {
    observer: Option<Box<dyn StateObserver>>,
}

impl Notifier {
    pub(crate) fn set(&mut self, observer: Box<dyn StateObserver>) {
        self.observer = Some(observer);
    }

    pub(crate) fn notify(&mut self, id: &DeviceId, state: &DeviceState) {
        if let Some(observer) = self.observer.as_mut() {
            observer.state_changed(id, state);
        }
    }
}
