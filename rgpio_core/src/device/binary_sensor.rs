use crate::device::{Device, DeviceId, DeviceState, Notifier, StateObserver};
use crate::pin::Input;

/// Digital input polled by the platform.
pub struct BinarySensor {
    id: DeviceId,
    input: Input,
    is_on: bool,
    available: bool,
    notifier: Notifier,
}

impl BinarySensor {
    /// Takes a first reading so the sensor starts with a real value.
    pub fn new(id: DeviceId, mut input: Input) -> Self {
        let reading = input.read();
        BinarySensor {
            id,
            input,
            is_on: reading.unwrap_or(false),
            available: reading.is_some(),
            notifier: Notifier::default(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Read the input again.
    ///
    /// Observers are notified only when the value changed.
    pub fn update(&mut self) {
        match self.input.read() {
            Some(is_on) => {
                self.available = true;
                if is_on != self.is_on {
                    self.is_on = is_on;
                    let state = self.state();
                    self.notifier.notify(&self.id, &state);
                }
            }
            None => self.available = false,
        }
    }
}

impl Device for BinarySensor {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn state(&self) -> DeviceState {
        DeviceState::BinarySensor { is_on: self.is_on }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn assumed_state(&self) -> bool {
        false
    }

    fn set_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.notifier.set(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_utils::recorder;
    use crate::hardware::dummy::DummyConnector;
    use crate::hardware::{GpioState, PullMode, RemoteHost};
    use crate::pin::PinClient;

    fn sensor(daemon: &DummyConnector, invert_logic: bool) -> BinarySensor {
        let client = PinClient::new(daemon.clone());
        let input = client
            .open_input(
                &RemoteHost::new("pi", 8888),
                4,
                PullMode::Up,
                50,
                invert_logic,
            )
            .unwrap();
        BinarySensor::new("door".into(), input)
    }

    #[test]
    fn first_reading_on_construction() {
        let daemon = DummyConnector::new();
        daemon.set_input(4, GpioState::High);
        let sensor = sensor(&daemon, false);
        assert!(sensor.is_on());
        assert!(sensor.is_available());
        assert!(!sensor.assumed_state());
    }

    #[test]
    fn update_notifies_on_change_only() {
        let daemon = DummyConnector::new();
        let mut sensor = sensor(&daemon, false);
        let (seen, observer) = recorder();
        sensor.set_observer(Box::new(observer));
        sensor.update();
        daemon.set_input(4, GpioState::High);
        sensor.update();
        sensor.update();
        assert!(sensor.is_on());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, DeviceState::BinarySensor { is_on: true });
    }

    #[test]
    fn inverted_sensor() {
        let daemon = DummyConnector::new();
        daemon.set_input(4, GpioState::High);
        let sensor = sensor(&daemon, true);
        assert!(!sensor.is_on());
    }

    #[test]
    fn failed_read_keeps_last_value() {
        let daemon = DummyConnector::new();
        daemon.set_input(4, GpioState::High);
        let mut sensor = sensor(&daemon, false);
        daemon.set_broken(true);
        sensor.update();
        assert!(sensor.is_on());
        assert!(!sensor.is_available());
        daemon.set_broken(false);
        sensor.update();
        assert!(sensor.is_available());
    }
}
