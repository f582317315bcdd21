use crate::opts::{Action, Command, Opt};
use log::info;
use rgpio_core::config::{
    BinarySensorConfig, ConfigError, LightConfig, PlatformConfig, SwitchConfig,
};
use rgpio_core::device::{Device, DeviceId, DeviceState, TurnOnOptions};
use rgpio_core::hardware::{dummy::DummyConnector, pigpiod::PigpiodConnector};
use rgpio_core::pin::PinClient;
use rgpio_core::setup::{setup_platform, Devices};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod opts;

pub fn init_logging(opt: &Opt) {
    let mut builder = env_logger::Builder::from_default_env();
    if opt.verbose() {
        builder.filter(None, log::LevelFilter::Debug);
    } else {
        builder.filter(None, log::LevelFilter::Info);
    }
    builder
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Could not read config: {0}")]
    Io(#[from] io::Error),
    #[error("Could not parse config: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No device named '{0}'")]
    UnknownDevice(String),
    #[error("Device '{0}' was skipped: {1}")]
    Skipped(String, String),
    #[error("Device '{0}' is unavailable")]
    Unavailable(String),
}

/// Config file of the tool: device groups plus connection settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(from = "ParseRgpioConfig")]
pub struct RgpioConfig {
    /// Socket timeout towards pigpiod, in milliseconds.
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub platform: PlatformConfig,
}

/// On-disk layout, with the device groups next to `timeout_ms`.
#[derive(Deserialize, Debug, Clone)]
struct ParseRgpioConfig {
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    lights: Vec<LightConfig>,
    #[serde(default)]
    switches: Vec<SwitchConfig>,
    #[serde(default)]
    binary_sensors: Vec<BinarySensorConfig>,
}

impl From<ParseRgpioConfig> for RgpioConfig {
    fn from(parse: ParseRgpioConfig) -> Self {
        Self {
            timeout_ms: parse.timeout_ms,
            platform: PlatformConfig {
                lights: parse.lights,
                switches: parse.switches,
                binary_sensors: parse.binary_sensors,
            },
        }
    }
}

impl RgpioConfig {
    pub fn try_new(config_file: &Path) -> Result<RgpioConfig, CliError> {
        let config_string = fs::read_to_string(config_file)?;
        let config: RgpioConfig =
            serde_json::from_str(&config_string).map_err(|err| CliError::Parse(err.to_string()))?;
        config.platform.validate()?;
        Ok(config)
    }

    pub fn connector(&self) -> PigpiodConnector {
        match self.timeout_ms {
            Some(ms) => PigpiodConnector::with_timeout(Duration::from_millis(ms)),
            None => PigpiodConnector::new(),
        }
    }
}

pub fn run(opt: &Opt) -> Result<(), CliError> {
    let config = RgpioConfig::try_new(&opt.config)?;
    let client = if opt.dummy {
        PinClient::new(DummyConnector::new())
    } else {
        PinClient::new(config.connector())
    };
    let mut devices = setup_platform(&config.platform, &client);
    for device in devices.iter_mut() {
        device.set_observer(Box::new(|id: &DeviceId, state: &DeviceState| {
            info!("'{}' is now {:?}", id, state)
        }));
    }
    run_command(&opt.command, &mut devices)
}

pub fn run_command(command: &Command, devices: &mut Devices) -> Result<(), CliError> {
    match command {
        Command::Check => {
            for device in devices.iter() {
                println!(
                    "{}: {}",
                    device.id(),
                    serde_json::to_string(&device.state())?
                );
            }
            for skipped in &devices.skipped {
                println!("{}: skipped, {}", skipped.id, skipped.reason);
            }
            Ok(())
        }
        Command::Light {
            name,
            action,
            brightness,
            color,
        } => {
            let id = DeviceId::from(name.as_str());
            match devices.light_mut(&id) {
                Some(light) => {
                    match action {
                        Action::On => light.turn_on(TurnOnOptions {
                            brightness: *brightness,
                            color: *color,
                        }),
                        Action::Off => light.turn_off(),
                    }
                    report(light)
                }
                None => Err(missing(devices, name)),
            }
        }
        Command::Switch { name, action } => {
            let id = DeviceId::from(name.as_str());
            match devices.switch_mut(&id) {
                Some(switch) => {
                    match action {
                        Action::On => switch.turn_on(),
                        Action::Off => switch.turn_off(),
                    }
                    report(switch)
                }
                None => Err(missing(devices, name)),
            }
        }
        Command::Read { name } => {
            let id = DeviceId::from(name.as_str());
            match devices.binary_sensor_mut(&id) {
                Some(sensor) => {
                    sensor.update();
                    report(sensor)
                }
                None => Err(missing(devices, name)),
            }
        }
    }
}

fn report(device: &dyn Device) -> Result<(), CliError> {
    if !device.is_available() {
        return Err(CliError::Unavailable(device.id().to_string()));
    }
    println!("{}", serde_json::to_string(&device.state())?);
    Ok(())
}

fn missing(devices: &Devices, name: &str) -> CliError {
    match devices
        .skipped
        .iter()
        .find(|skipped| skipped.id.as_ref() == name)
    {
        Some(skipped) => CliError::Skipped(name.to_string(), skipped.reason.to_string()),
        None => CliError::UnknownDevice(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgpio_core::config::DEFAULT_FREQUENCY;
    use rgpio_core::hardware::PullMode;
    use std::path::PathBuf;
    use structopt::StructOpt;

    const CONFIG: &str = r#"
        {
          "timeout_ms": 500,
          "lights": [{"host": "pi", "ports": {"kitchen": [17, 27, 22]}}],
          "switches": [{"host": "pi", "ports": {"23": "fan"}}],
          "binary_sensors": [{"host": "pi", "ports": {"25": "window"}, "pull_mode": "DOWN"}]
        }
    "#;

    fn config_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rgpio-cli-{}-{}.json",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    fn opt(path: &Path, args: &[&str]) -> Opt {
        let mut argv = vec!["rgpio-cli", "--config", path.to_str().unwrap(), "--dummy"];
        argv.extend_from_slice(args);
        Opt::from_iter(argv)
    }

    #[test]
    fn parse_config() {
        let config: RgpioConfig = serde_json::from_str(CONFIG).unwrap();
        assert_eq!(config.timeout_ms, Some(500));
        assert_eq!(config.platform.lights[0].frequency, DEFAULT_FREQUENCY);
        assert_eq!(
            config.platform.switches[0].ports[&23],
            DeviceId::from("fan")
        );
        let sensors = &config.platform.binary_sensors[0];
        assert_eq!(sensors.ports[&25], DeviceId::from("window"));
        assert_eq!(sensors.pull(), Ok(PullMode::Down));
        assert!(config.platform.validate().is_ok());

        let config: RgpioConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RgpioConfig::default());
    }

    #[test]
    fn try_new_validates() {
        let path = config_file(
            "invalid",
            r#"{"binary_sensors": [{"host": "pi", "ports": {"4": "door"}, "pull_mode": "OFF"}]}"#,
        );
        assert!(matches!(
            RgpioConfig::try_new(&path),
            Err(CliError::Config(ConfigError::PullMode(_)))
        ));
        let path = config_file("valid", CONFIG);
        let config = RgpioConfig::try_new(&path).unwrap();
        assert_eq!(config.platform.switches.len(), 1);
        assert_eq!(config.platform.binary_sensors.len(), 1);
        let path = config_file("garbage", "not json");
        assert!(matches!(
            RgpioConfig::try_new(&path),
            Err(CliError::Parse(_))
        ));
        assert!(matches!(
            RgpioConfig::try_new(Path::new("/nonexistent/rgpio.json")),
            Err(CliError::Io(_))
        ));
    }

    #[test]
    fn commands_against_dummy_daemon() {
        let path = config_file("commands", CONFIG);
        assert!(run(&opt(&path, &["check"])).is_ok());
        assert!(run(&opt(&path, &["switch", "fan", "on"])).is_ok());
        assert!(run(&opt(&path, &["light", "kitchen", "on", "--brightness", "128"])).is_ok());
        assert!(run(&opt(&path, &["read", "window"])).is_ok());
        assert!(matches!(
            run(&opt(&path, &["switch", "kitchen", "on"])),
            Err(CliError::UnknownDevice(_))
        ));
    }

    #[test]
    fn skipped_device_reports_reason() {
        let path = config_file(
            "skipped",
            r#"{"switches": [{"host": "pi", "ports": {"60": "pump"}}]}"#,
        );
        match run(&opt(&path, &["switch", "pump", "on"])) {
            Err(CliError::Skipped(name, reason)) => {
                assert_eq!(name, "pump");
                assert!(reason.contains("outside 0..=53"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
