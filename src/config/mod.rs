use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::time::Duration;
use thiserror::Error;

/// Locations searched for the configuration file, first match wins.
pub const CONFIG_PATHS: [&str; 2] = ["config/dsmr-sim.yaml", "dsmr-sim.yaml"];

/// Prefix of the environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "DSMR_SIM_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum ChannelKind {
    Serial,
    File,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum CurrentMode {
    Constant,
    Ramp,
    Random,
}

fn port_default() -> String {
    return "/dev/serial/by-id/usb-Silicon_Labs_CP2104_USB_to_UART_Bridge_Controller_011F15F2-if00-port0".to_string();
}
fn channel_default() -> ChannelKind { return ChannelKind::Serial }
fn baud_rate_default() -> u32 { return 115200 }
fn interval_default() -> f64 { return 1.0 }
fn current_default() -> u32 { return 5 }
fn current_mode_default() -> CurrentMode { return CurrentMode::Constant }
fn current_max_default() -> u32 { return 25 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default="port_default")]
    pub port: String,
    #[serde(default="channel_default")]
    pub channel: ChannelKind,
    #[serde(default="baud_rate_default")]
    pub baud_rate: u32,
    /// Seconds between two telegrams
    #[serde(default="interval_default")]
    pub interval: f64,
    #[serde(default="current_default")]
    pub current: u32,
    #[serde(default="current_mode_default")]
    pub current_mode: CurrentMode,
    /// Upper bound for the ramp and random modes
    #[serde(default="current_max_default")]
    pub current_max: u32,
    /// Telegram template file, the built in ESMR 5.0 telegram if unset
    #[serde(default)]
    pub template: Option<String>,
    /// Stop after this many telegrams, run until interrupted if unset
    #[serde(default)]
    pub count: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        return Config {
            port: port_default(),
            channel: channel_default(),
            baud_rate: baud_rate_default(),
            interval: interval_default(),
            current: current_default(),
            current_mode: current_mode_default(),
            current_max: current_max_default(),
            template: None,
            count: None,
        };
    }
}

impl Config {
    /// Read the first config file found (defaults if there is none) and apply
    /// the environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for path in CONFIG_PATHS {
            let mut file = match File::open(path) {
                Ok(f) => f,
                Err(_) => continue,
            };

            let mut contents = String::new();
            file.read_to_string(&mut contents).map_err(|e| ConfigError::Io {
                path: path.to_string(),
                source: e,
            })?;
            config = Config::from_yaml(&contents)?;
            info!("Loaded configuration from {}", path);
            break;
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        return Ok(config);
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        /* An empty file is a valid config holding only defaults */
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        let c: Config = serde_yml::from_str(contents)?;
        return Ok(c);
    }

    /// Override single options from `DSMR_SIM_<OPTION>` variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|v| (key, v.trim().to_string()))
        };

        if let Some((_, v)) = get("PORT") {
            self.port = v;
        }
        if let Some((key, v)) = get("CHANNEL") {
            self.channel = match v.to_lowercase().as_str() {
                "serial" => ChannelKind::Serial,
                "file" => ChannelKind::File,
                _ => return Err(ConfigError::InvalidValue { key, value: v }),
            };
        }
        if let Some((key, v)) = get("BAUD_RATE") {
            self.baud_rate = parse_value(&key, &v)?;
        }
        if let Some((key, v)) = get("INTERVAL") {
            self.interval = parse_value(&key, &v)?;
        }
        if let Some((key, v)) = get("CURRENT") {
            self.current = parse_value(&key, &v)?;
        }
        if let Some((key, v)) = get("CURRENT_MODE") {
            self.current_mode = match v.to_lowercase().as_str() {
                "constant" => CurrentMode::Constant,
                "ramp" => CurrentMode::Ramp,
                "random" => CurrentMode::Random,
                _ => return Err(ConfigError::InvalidValue { key, value: v }),
            };
        }
        if let Some((key, v)) = get("CURRENT_MAX") {
            self.current_max = parse_value(&key, &v)?;
        }
        if let Some((_, v)) = get("TEMPLATE") {
            self.template = if v.is_empty() { None } else { Some(v) };
        }
        if let Some((key, v)) = get("COUNT") {
            self.count = Some(parse_value(&key, &v)?);
        }

        debug!("Effective configuration: {:?}", self);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        /* Has to fit a Duration, this also rules out NaN, infinity and negatives */
        if Duration::try_from_secs_f64(self.interval).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "interval".to_string(),
                value: self.interval.to_string(),
            });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "baud_rate".to_string(),
                value: self.baud_rate.to_string(),
            });
        }
        if self.current_mode != CurrentMode::Constant && self.current_max < self.current {
            return Err(ConfigError::InvalidValue {
                key: "current_max".to_string(),
                value: self.current_max.to_string(),
            });
        }
        Ok(())
    }

    /// Interval as a `Duration`, saturating for values `validate` rejects.
    pub fn interval_duration(&self) -> Duration {
        return Duration::try_from_secs_f64(self.interval).unwrap_or(Duration::MAX);
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert!(c.port.starts_with("/dev/serial/by-id/usb-Silicon_Labs_CP2104"));
        assert_eq!(c.channel, ChannelKind::Serial);
        assert_eq!(c.baud_rate, 115200);
        assert_eq!(c.interval_duration(), Duration::from_secs(1));
        assert_eq!(c.current, 5);
        assert_eq!(c.current_mode, CurrentMode::Constant);
        assert_eq!(c.template, None);
        assert_eq!(c.count, None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let c = Config::from_yaml("port: /dev/ttyUSB0\ninterval: 0.5\ncurrent: 23\n").unwrap();
        assert_eq!(c.port, "/dev/ttyUSB0");
        assert_eq!(c.interval_duration(), Duration::from_millis(500));
        assert_eq!(c.current, 23);
        assert_eq!(c.baud_rate, 115200);
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = "
port: /tmp/ttyV0
channel: File
baud_rate: 9600
interval: 10
current: 3
current_mode: Ramp
current_max: 16
template: telegram.txt
count: 100
";
        let c = Config::from_yaml(yaml).unwrap();
        assert_eq!(c.channel, ChannelKind::File);
        assert_eq!(c.baud_rate, 9600);
        assert_eq!(c.current_mode, CurrentMode::Ramp);
        assert_eq!(c.current_max, 16);
        assert_eq!(c.template, Some("telegram.txt".to_string()));
        assert_eq!(c.count, Some(100));
    }

    #[test]
    fn test_from_yaml_empty_and_invalid() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert!(matches!(Config::from_yaml("baud_rate: fast"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut c = Config::default();
        c.apply_env_overrides(env(&[
            ("DSMR_SIM_PORT", "/dev/ttyACM0"),
            ("DSMR_SIM_BAUD_RATE", "9600"),
            ("DSMR_SIM_INTERVAL", "0.01"),
            ("DSMR_SIM_CURRENT", "23"),
            ("DSMR_SIM_CURRENT_MODE", "random"),
            ("DSMR_SIM_CHANNEL", "file"),
            ("DSMR_SIM_COUNT", "3"),
        ]))
        .unwrap();
        assert_eq!(c.port, "/dev/ttyACM0");
        assert_eq!(c.baud_rate, 9600);
        assert_eq!(c.interval, 0.01);
        assert_eq!(c.current, 23);
        assert_eq!(c.current_mode, CurrentMode::Random);
        assert_eq!(c.channel, ChannelKind::File);
        assert_eq!(c.count, Some(3));
    }

    #[test]
    fn test_env_override_invalid() {
        let mut c = Config::default();
        let result = c.apply_env_overrides(env(&[("DSMR_SIM_BAUD_RATE", "fast")]));
        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "DSMR_SIM_BAUD_RATE");
                assert_eq!(value, "fast");
            }
            _ => panic!("expected invalid value"),
        }

        let result = c.apply_env_overrides(env(&[("DSMR_SIM_CURRENT_MODE", "sine")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate() {
        let mut c = Config::default();
        c.interval = -1.0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.apply_env_overrides(env(&[("DSMR_SIM_INTERVAL", "1e30")])).unwrap();
        match c.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "interval"),
            _ => panic!("expected invalid interval"),
        }
        assert_eq!(c.interval_duration(), Duration::MAX);

        c.interval = f64::NAN;
        assert!(c.validate().is_err());
        c.interval = 0.0;
        assert!(c.validate().is_ok());

        let mut c = Config::default();
        c.current_mode = CurrentMode::Ramp;
        c.current = 30;
        c.current_max = 10;
        assert!(c.validate().is_err());

        c.current_mode = CurrentMode::Constant;
        assert!(c.validate().is_ok());
    }
}
