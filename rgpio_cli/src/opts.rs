use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "rgpio-cli", about = "Control GPIO devices on remote Raspberry Pis")]
pub struct Opt {
    /// JSON device configuration
    #[structopt(long, parse(from_os_str))]
    pub config: PathBuf,
    /// Use the in-memory daemon instead of pigpiod
    #[structopt(long)]
    pub dummy: bool,
    #[structopt(long)]
    verbose: bool,
    #[structopt(subcommand)]
    pub command: Command,
}

impl Opt {
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// List devices that were set up and those that were skipped
    #[structopt(name = "check")]
    Check,
    /// Turn an RGB light on or off
    #[structopt(name = "light")]
    Light {
        name: String,
        action: Action,
        #[structopt(long)]
        brightness: Option<u8>,
        /// Color as "r,g,b"
        #[structopt(long, parse(try_from_str = parse_color))]
        color: Option<[u8; 3]>,
    },
    /// Turn a switch on or off
    #[structopt(name = "switch")]
    Switch { name: String, action: Action },
    /// Read a binary sensor
    #[structopt(name = "read")]
    Read { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    On,
    Off,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Action::On),
            "off" => Ok(Action::Off),
            _ => Err(format!("Unknown action '{}', expected 'on' or 'off'", s)),
        }
    }
}

pub fn parse_color(s: &str) -> Result<[u8; 3], String> {
    let components = s
        .split(',')
        .map(|component| component.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("Invalid color '{}': {}", s, err))?;
    components
        .try_into()
        .map_err(|_| format!("Invalid color '{}': expected three components", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color() {
        assert_eq!(parse_color("255,0,10"), Ok([255, 0, 10]));
        assert_eq!(parse_color(" 1, 2 ,3"), Ok([1, 2, 3]));
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,3,4").is_err());
        assert!(parse_color("256,0,0").is_err());
    }

    #[test]
    fn light_command() {
        let opt = Opt::from_iter(&[
            "rgpio-cli",
            "--config",
            "devices.json",
            "light",
            "kitchen",
            "on",
            "--color",
            "255,0,0",
        ]);
        assert!(!opt.verbose());
        match opt.command {
            Command::Light {
                name,
                action,
                brightness,
                color,
            } => {
                assert_eq!(name, "kitchen");
                assert_eq!(action, Action::On);
                assert_eq!(brightness, None);
                assert_eq!(color, Some([255, 0, 0]));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn bad_action() {
        let res = Opt::from_iter_safe(&[
            "rgpio-cli",
            "--config",
            "devices.json",
            "switch",
            "fan",
            "toggle",
        ]);
        assert!(res.is_err());
    }
}
