use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use mic_level::adc::ADC_CHANNELS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub descriptor: String,  // e.g. "spi0" or "bus 0"
    pub channel: u8,         // Microphone input on the ADC
    pub window_ms: u32,      // Length of one sampling window
    pub interval_ms: u64,    // Cadence between windows
    pub scale_max: i32,      // Reported level runs 0..=scale_max
    pub websocket_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            descriptor: String::from("spi0"),
            channel: 0,
            window_ms: 50,
            interval_ms: 100,
            scale_max: 100,
            websocket_addr: String::from("0.0.0.0:10013"),
        }
    }
}

impl Config {
    /// Reads a JSON config, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel >= ADC_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "channel {} out of range 0-{}",
                self.channel,
                ADC_CHANNELS - 1
            )));
        }
        if self.scale_max < 0 {
            return Err(ConfigError::Invalid(format!(
                "scale_max {} must be >= 0",
                self.scale_max
            )));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be > 0".to_string()));
        }
        if u64::from(self.window_ms) > self.interval_ms {
            warn!(
                "window_ms {} exceeds interval_ms {}, windows will run back to back",
                self.window_ms, self.interval_ms
            );
        }
        Ok(())
    }
}
