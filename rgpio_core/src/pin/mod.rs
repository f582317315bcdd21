//! Pin acquisition and pin handles.
//!
//! A [`PinClient`] claims a pin on a remote host and hands back a handle bound to
//! its own connection: [`Output`], [`PwmOutput`] or [`Input`].
//! Acquisition either yields a fully configured handle or an [`AcquireError`], never a
//! half configured pin. Dropping a handle releases the claim.
use crate::hardware::{Command, Connector, HardwareError, PinTransport, PullMode, RemoteHost};
use log::{debug, info};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub mod input;
pub mod output;
pub mod pwm;

pub use input::Input;
pub use output::Output;
pub use pwm::PwmOutput;

/// Highest BCM GPIO number on a Raspberry Pi.
pub const MAX_GPIO: u32 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    PwmOutput { frequency_hz: u32 },
    Input { pull: PullMode, bounce_time_ms: u64 },
}

/// Everything needed to acquire one pin, derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSpec {
    pub host: RemoteHost,
    pub pin: u32,
    pub invert_logic: bool,
    pub mode: PinMode,
}

impl PinSpec {
    pub fn output(host: RemoteHost, pin: u32, invert_logic: bool) -> Self {
        PinSpec {
            host,
            pin,
            invert_logic,
            mode: PinMode::Output,
        }
    }

    pub fn pwm_output(host: RemoteHost, pin: u32, invert_logic: bool, frequency_hz: u32) -> Self {
        PinSpec {
            host,
            pin,
            invert_logic,
            mode: PinMode::PwmOutput { frequency_hz },
        }
    }

    pub fn input(
        host: RemoteHost,
        pin: u32,
        invert_logic: bool,
        pull: PullMode,
        bounce_time_ms: u64,
    ) -> Self {
        PinSpec {
            host,
            pin,
            invert_logic,
            mode: PinMode::Input {
                pull,
                bounce_time_ms,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Could not acquire pin {pin} on '{host}': pin number outside 0..=53")]
    OutOfRange { host: RemoteHost, pin: u32 },
    #[error("Could not acquire pin {pin} on '{host}': pin is already claimed")]
    AlreadyClaimed { host: RemoteHost, pin: u32 },
    #[error("Could not acquire pin {pin} on '{host}': {source}")]
    Rejected {
        host: RemoteHost,
        pin: u32,
        source: HardwareError,
    },
    #[error("Could not acquire pin {pin} on '{host}': debounce filter failed: {source}")]
    Debounce {
        host: RemoteHost,
        pin: u32,
        source: HardwareError,
    },
}

/// Outcome of a best-effort write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The daemon accepted the write.
    Applied,
    /// The value was outside the accepted range and nothing was sent.
    Ignored,
    /// The write did not reach the pin.
    Failed,
}

impl Delivery {
    pub fn is_failed(self) -> bool {
        self == Delivery::Failed
    }
}

pub enum PinHandle {
    Output(Output),
    PwmOutput(PwmOutput),
    Input(Input),
}

impl PinHandle {
    pub fn pin(&self) -> u32 {
        match self {
            PinHandle::Output(output) => output.pin(),
            PinHandle::PwmOutput(pwm) => pwm.pin(),
            PinHandle::Input(input) => input.pin(),
        }
    }
}

type Claims = Arc<Mutex<HashSet<(RemoteHost, u32)>>>;

/// One claimed pin and the connection used to drive it.
pub(crate) struct RemotePin {
    host: RemoteHost,
    pin: u32,
    transport: Box<dyn PinTransport>,
    claims: Claims,
}

impl RemotePin {
    pub(crate) fn host(&self) -> &RemoteHost {
        &self.host
    }

    pub(crate) fn pin(&self) -> u32 {
        self.pin
    }

    pub(crate) fn execute(&mut self, command: Command) -> Result<u32, HardwareError> {
        debug!("Pin {} on '{}': {:?}", self.pin, self.host, command);
        self.transport.execute(command)
    }

    pub(crate) fn rejected(&self, source: HardwareError) -> AcquireError {
        AcquireError::Rejected {
            host: self.host.clone(),
            pin: self.pin,
            source,
        }
    }
}

impl Drop for RemotePin {
    fn drop(&mut self) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims.remove(&(self.host.clone(), self.pin));
        debug!("Released pin {} on '{}'", self.pin, self.host);
    }
}

/// Acquires pins on remote hosts.
///
/// A pin can only be held by one handle at a time per client.
pub struct PinClient {
    connector: Box<dyn Connector>,
    claims: Claims,
}

impl PinClient {
    pub fn new<C: Connector + 'static>(connector: C) -> Self {
        PinClient {
            connector: Box::new(connector),
            claims: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn acquire(&self, spec: &PinSpec) -> Result<PinHandle, AcquireError> {
        match spec.mode {
            PinMode::Output => self
                .acquire_output(&spec.host, spec.pin, spec.invert_logic)
                .map(PinHandle::Output),
            PinMode::PwmOutput { frequency_hz } => self
                .acquire_pwm_output(&spec.host, spec.pin, spec.invert_logic, frequency_hz)
                .map(PinHandle::PwmOutput),
            PinMode::Input {
                pull,
                bounce_time_ms,
            } => self
                .open_input(&spec.host, spec.pin, pull, bounce_time_ms, spec.invert_logic)
                .map(PinHandle::Input),
        }
    }

    /// Claim `pin` as a plain output, driven off right away.
    ///
    /// With `invert_logic` "on" drives the pin low.
    pub fn acquire_output(
        &self,
        host: &RemoteHost,
        pin: u32,
        invert_logic: bool,
    ) -> Result<Output, AcquireError> {
        let output = Output::try_new(self.claim(host, pin)?, invert_logic)?;
        info!("Acquired output pin {} on '{}'", pin, host);
        Ok(output)
    }

    pub fn acquire_pwm_output(
        &self,
        host: &RemoteHost,
        pin: u32,
        invert_logic: bool,
        frequency_hz: u32,
    ) -> Result<PwmOutput, AcquireError> {
        let pwm = PwmOutput::try_new(self.claim(host, pin)?, invert_logic, frequency_hz)?;
        info!(
            "Acquired PWM pin {} on '{}' at {} Hz",
            pin,
            host,
            pwm.frequency_hz()
        );
        Ok(pwm)
    }

    pub fn acquire_input(
        &self,
        host: &RemoteHost,
        pin: u32,
        pull: PullMode,
        bounce_time_ms: u64,
    ) -> Result<Input, AcquireError> {
        self.open_input(host, pin, pull, bounce_time_ms, false)
    }

    pub(crate) fn open_input(
        &self,
        host: &RemoteHost,
        pin: u32,
        pull: PullMode,
        bounce_time_ms: u64,
        invert_logic: bool,
    ) -> Result<Input, AcquireError> {
        let input = Input::try_new(self.claim(host, pin)?, pull, bounce_time_ms, invert_logic)?;
        info!("Acquired input pin {} on '{}' ({:?})", pin, host, pull);
        Ok(input)
    }

    fn claim(&self, host: &RemoteHost, pin: u32) -> Result<RemotePin, AcquireError> {
        if pin > MAX_GPIO {
            return Err(AcquireError::OutOfRange {
                host: host.clone(),
                pin,
            });
        }
        {
            let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
            if !claims.insert((host.clone(), pin)) {
                return Err(AcquireError::AlreadyClaimed {
                    host: host.clone(),
                    pin,
                });
            }
        }
        // From here on the claim is owned by the RemotePin, or released on failure.
        let transport = match self.connector.connect(host) {
            Ok(transport) => transport,
            Err(source) => {
                let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
                claims.remove(&(host.clone(), pin));
                return Err(AcquireError::Rejected {
                    host: host.clone(),
                    pin,
                    source,
                });
            }
        };
        Ok(RemotePin {
            host: host.clone(),
            pin,
            transport,
            claims: Arc::clone(&self.claims),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::dummy::DummyConnector;
    use crate::hardware::{Direction, GpioState};

    fn host() -> RemoteHost {
        RemoteHost::new("pi", 8888)
    }

    #[test]
    fn output_is_driven_off_on_acquire() {
        let daemon = DummyConnector::new();
        let client = PinClient::new(daemon.clone());
        let _output = client.acquire_output(&host(), 17, false).unwrap();
        let commands: Vec<Command> = daemon.commands().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            commands,
            vec![
                Command::SetMode {
                    pin: 17,
                    direction: Direction::Output
                },
                Command::Write {
                    pin: 17,
                    state: GpioState::Low
                },
            ]
        );
    }

    #[test]
    fn out_of_range_pin_fails_without_io() {
        let daemon = DummyConnector::new();
        let client = PinClient::new(daemon.clone());
        let res = client.acquire_output(&host(), 54, false);
        assert!(matches!(res, Err(AcquireError::OutOfRange { pin: 54, .. })));
        assert!(daemon.commands().is_empty());
    }

    #[test]
    fn unreachable_host_yields_no_handle() {
        let daemon = DummyConnector::new();
        daemon.set_unreachable("pi");
        let client = PinClient::new(daemon);
        let res = client.acquire_output(&host(), 17, false);
        assert!(matches!(res, Err(AcquireError::Rejected { .. })));
        let msg = res.err().map(|err| err.to_string()).unwrap_or_default();
        assert!(msg.starts_with("Could not acquire pin 17 on 'pi:8888'"));
    }

    #[test]
    fn daemon_rejecting_pin_yields_no_handle() {
        let daemon = DummyConnector::new();
        daemon.reject_pin(3);
        let client = PinClient::new(daemon);
        assert!(matches!(
            client.acquire_pwm_output(&host(), 3, false, 10_000),
            Err(AcquireError::Rejected {
                source: HardwareError::BadPin(3),
                ..
            })
        ));
        // A failed acquisition leaves the pin claimable.
        assert!(matches!(
            client.acquire_pwm_output(&host(), 3, false, 10_000),
            Err(AcquireError::Rejected { .. })
        ));
    }

    #[test]
    fn pin_can_only_be_claimed_once() {
        let client = PinClient::new(DummyConnector::new());
        let first = client.acquire_output(&host(), 22, false).unwrap();
        assert!(matches!(
            client.acquire_output(&host(), 22, false),
            Err(AcquireError::AlreadyClaimed { pin: 22, .. })
        ));
        // Same pin number on another host is a different pin.
        assert!(client
            .acquire_output(&RemoteHost::new("other", 8888), 22, false)
            .is_ok());
        drop(first);
        assert!(client.acquire_output(&host(), 22, false).is_ok());
    }

    #[test]
    fn acquire_from_spec() {
        let daemon = DummyConnector::new();
        daemon.set_input(6, GpioState::High);
        let client = PinClient::new(daemon);
        let spec = PinSpec::input(host(), 6, true, PullMode::Down, 0);
        match client.acquire(&spec) {
            Ok(PinHandle::Input(mut input)) => assert_eq!(input.read(), Some(false)),
            _ => panic!("expected an input handle"),
        }
        let spec = PinSpec::pwm_output(host(), 12, false, 800);
        let handle = client.acquire(&spec).unwrap();
        assert!(matches!(handle, PinHandle::PwmOutput(_)));
        assert_eq!(handle.pin(), 12);
    }
}
