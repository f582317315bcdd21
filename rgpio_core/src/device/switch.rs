use crate::device::{Device, DeviceId, DeviceState, Notifier, StateObserver};
use crate::pin::Output;
use log::warn;

/// On/off device on a single output pin.
pub struct Switch {
    id: DeviceId,
    output: Output,
    is_on: bool,
    available: bool,
    notifier: Notifier,
}

impl Switch {
    pub fn new(id: DeviceId, output: Output) -> Self {
        Switch {
            id,
            output,
            is_on: false,
            available: true,
            notifier: Notifier::default(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn turn_on(&mut self) {
        self.set(true);
    }

    pub fn turn_off(&mut self) {
        self.set(false);
    }

    fn set(&mut self, on: bool) {
        self.available = !self.output.write(on).is_failed();
        if !self.available {
            warn!("Switch '{}': write failed, state unchanged", self.id);
            return;
        }
        self.is_on = on;
        let state = self.state();
        self.notifier.notify(&self.id, &state);
    }
}

impl Device for Switch {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn state(&self) -> DeviceState {
        DeviceState::Switch { is_on: self.is_on }
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
