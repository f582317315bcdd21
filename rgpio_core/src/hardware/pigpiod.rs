//! # pigpiod socket client
//!
//! pigpiod accepts fixed size commands over TCP.
//! A request is four little-endian `u32` words `(cmd, p1, p2, p3)`,
//! the response echoes `cmd, p1, p2` and replaces `p3` with a signed result.
//! Negative results are pigpio error codes.
//!
//! <https://abyz.me.uk/rpi/pigpio/sif.html>
use crate::hardware::{
    Command, Connector, Direction, GpioState, HardwareError, PinTransport, PullMode, RemoteHost,
};
use log::debug;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const CMD_MODES: u32 = 0;
const CMD_PUD: u32 = 2;
const CMD_READ: u32 = 3;
const CMD_WRITE: u32 = 4;
const CMD_PWM: u32 = 5;
const CMD_PRS: u32 = 6;
const CMD_PFS: u32 = 7;
const CMD_FG: u32 = 97;

const PI_BAD_USER_GPIO: i32 = -2;
const PI_BAD_GPIO: i32 = -3;
const PI_NOT_PERMITTED: i32 = -41;

const FRAME_LEN: usize = 16;

/// Connects to pigpiod over TCP, one socket per pin.
#[derive(Debug, Clone, Default)]
pub struct PigpiodConnector {
    timeout: Option<Duration>,
}

impl PigpiodConnector {
    pub fn new() -> Self {
        PigpiodConnector::default()
    }

    /// Fail connects, reads and writes that take longer than `timeout`.
    ///
    /// Without a timeout a hung daemon blocks the caller indefinitely.
    pub fn with_timeout(timeout: Duration) -> Self {
        PigpiodConnector {
            timeout: Some(timeout),
        }
    }
}

impl Connector for PigpiodConnector {
    fn connect(&self, host: &RemoteHost) -> Result<Box<dyn PinTransport>, HardwareError> {
        Ok(Box::new(PigpiodTransport::connect(host, self.timeout)?))
    }
}

pub struct PigpiodTransport {
    host: RemoteHost,
    stream: TcpStream,
}

impl PigpiodTransport {
    pub fn connect(host: &RemoteHost, timeout: Option<Duration>) -> Result<Self, HardwareError> {
        let connect_err = |source| HardwareError::Connect {
            host: host.clone(),
            source,
        };
        let stream = match timeout {
            Some(timeout) => connect_with_timeout(host, timeout).map_err(connect_err)?,
            None => TcpStream::connect((host.address.as_str(), host.port)).map_err(connect_err)?,
        };
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;
        debug!("Connected to pigpiod at '{}'", host);
        Ok(PigpiodTransport {
            host: host.clone(),
            stream,
        })
    }
}

fn connect_with_timeout(host: &RemoteHost, timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host.address.as_str(), host.port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("'{}' did not resolve to any address", host.address),
        )
    }))
}

impl PinTransport for PigpiodTransport {
    fn execute(&mut self, command: Command) -> Result<u32, HardwareError> {
        let request = encode(&command);
        self.stream.write_all(&request)?;
        let mut response = [0u8; FRAME_LEN];
        self.stream.read_exact(&mut response)?;
        let result = decode(&command, &response);
        debug!("'{}' {:?} -> {:?}", self.host, command, result);
        result
    }
}

fn words(command: &Command) -> [u32; 3] {
    match *command {
        Command::SetMode { pin, direction } => {
            let mode = match direction {
                Direction::Input => 0,
                Direction::Output => 1,
            };
            [CMD_MODES, pin, mode]
        }
        Command::SetPull { pin, pull } => {
            let pud = match pull {
                PullMode::Down => 1,
                PullMode::Up => 2,
            };
            [CMD_PUD, pin, pud]
        }
        Command::Read { pin } => [CMD_READ, pin, 0],
        Command::Write { pin, state } => {
            let level = match state {
                GpioState::Low => 0,
                GpioState::High => 1,
            };
            [CMD_WRITE, pin, level]
        }
        Command::SetDutyCycle { pin, duty } => [CMD_PWM, pin, duty],
        Command::SetPwmRange { pin, range } => [CMD_PRS, pin, range],
        Command::SetPwmFrequency { pin, frequency_hz } => [CMD_PFS, pin, frequency_hz],
        Command::SetGlitchFilter { pin, steady_us } => [CMD_FG, pin, steady_us],
    }
}

fn encode(command: &Command) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    for (chunk, word) in frame.chunks_exact_mut(4).zip(words(command)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    frame
}

fn word_at(frame: &[u8; FRAME_LEN], index: usize) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(&frame[index * 4..index * 4 + 4]);
    word
}

fn decode(command: &Command, frame: &[u8; FRAME_LEN]) -> Result<u32, HardwareError> {
    let echoed = u32::from_le_bytes(word_at(frame, 0));
    let expected = words(command)[0];
    if echoed != expected {
        return Err(HardwareError::Response(format!(
            "expected echo of command {}, got {}",
            expected, echoed
        )));
    }
    let result = i32::from_le_bytes(word_at(frame, 3));
    match result {
        code if code >= 0 => Ok(code.unsigned_abs()),
        PI_BAD_USER_GPIO | PI_BAD_GPIO => Err(HardwareError::BadPin(command.pin())),
        PI_NOT_PERMITTED => Err(HardwareError::NotPermitted(command.pin())),
        code => Err(HardwareError::Daemon {
            command: *command,
            code,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn response(cmd: u32, result: i32) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0..4].copy_from_slice(&cmd.to_le_bytes());
        frame[12..16].copy_from_slice(&result.to_le_bytes());
        frame
    }

    /// Answers every request with the next canned result and returns the requests seen.
    fn fake_daemon(results: Vec<i32>) -> (RemoteHost, thread::JoinHandle<Vec<[u8; FRAME_LEN]>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            for result in results {
                let mut request = [0u8; FRAME_LEN];
                stream.read_exact(&mut request).unwrap();
                let cmd = u32::from_le_bytes(word_at(&request, 0));
                stream.write_all(&response(cmd, result)).unwrap();
                seen.push(request);
            }
            seen
        });
        (RemoteHost::new("127.0.0.1", port), handle)
    }

    #[test]
    fn encode_write() {
        let frame = encode(&Command::Write {
            pin: 17,
            state: GpioState::High,
        });
        assert_eq!(
            frame,
            [4, 0, 0, 0, 17, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn encode_pull_and_filter() {
        let pull = encode(&Command::SetPull {
            pin: 4,
            pull: PullMode::Up,
        });
        assert_eq!(word_at(&pull, 0), 2u32.to_le_bytes());
        assert_eq!(word_at(&pull, 2), 2u32.to_le_bytes());
        let filter = encode(&Command::SetGlitchFilter {
            pin: 4,
            steady_us: 50_000,
        });
        assert_eq!(word_at(&filter, 0), 97u32.to_le_bytes());
        assert_eq!(word_at(&filter, 2), 50_000u32.to_le_bytes());
    }

    #[test]
    fn decode_error_codes() {
        let read = Command::Read { pin: 60 };
        assert!(matches!(
            decode(&read, &response(CMD_READ, PI_BAD_GPIO)),
            Err(HardwareError::BadPin(60))
        ));
        assert!(matches!(
            decode(&read, &response(CMD_READ, PI_NOT_PERMITTED)),
            Err(HardwareError::NotPermitted(60))
        ));
        assert!(matches!(
            decode(&read, &response(CMD_READ, -8)),
            Err(HardwareError::Daemon { code: -8, .. })
        ));
        assert!(matches!(
            decode(&read, &response(CMD_WRITE, 0)),
            Err(HardwareError::Response(_))
        ));
        assert_eq!(decode(&read, &response(CMD_READ, 1)).unwrap(), 1);
    }

    #[test]
    fn round_trip_against_fake_daemon() {
        let (host, daemon) = fake_daemon(vec![0, 1]);
        let mut transport = PigpiodTransport::connect(&host, None).unwrap();
        transport
            .execute(Command::SetDutyCycle {
                pin: 18,
                duty: 5020,
            })
            .unwrap();
        assert_eq!(transport.execute(Command::Read { pin: 23 }).unwrap(), 1);
        let seen = daemon.join().unwrap();
        assert_eq!(word_at(&seen[0], 0), CMD_PWM.to_le_bytes());
        assert_eq!(word_at(&seen[0], 1), 18u32.to_le_bytes());
        assert_eq!(word_at(&seen[0], 2), 5020u32.to_le_bytes());
        assert_eq!(word_at(&seen[1], 0), CMD_READ.to_le_bytes());
    }

    #[test]
    fn unreachable_daemon() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = PigpiodConnector::with_timeout(Duration::from_millis(500));
        let res = connector.connect(&RemoteHost::new("127.0.0.1", port));
        assert!(matches!(res, Err(HardwareError::Connect { .. })));
    }
}
