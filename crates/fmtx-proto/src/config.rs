use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub band: BandConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub doze: DozeConfig,
}

/// Regional FM band limits.  All frequencies are in the transmitter's native
/// unit, kHz (98100 = 98.1 MHz).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    #[serde(default = "default_lower_khz")]
    pub lower_khz: u32,
    #[serde(default = "default_upper_khz")]
    pub upper_khz: u32,
    #[serde(default = "default_spacing_khz")]
    pub spacing_khz: u32,
    /// Frequency used when nothing has ever been tuned.
    #[serde(default = "default_frequency_khz")]
    pub default_khz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Preference file holding the last tuned frequency and preset slots.
    #[serde(default = "default_prefs_file")]
    pub prefs_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Hand-wave doze wake preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DozeConfig {
    #[serde(default = "default_handwave")]
    pub handwave_gesture: bool,
}

impl BandConfig {
    pub fn contains(&self, khz: u32) -> bool {
        khz >= self.lower_khz && khz <= self.upper_khz
    }

    pub fn clamp(&self, khz: u32) -> u32 {
        khz.clamp(self.lower_khz, self.upper_khz)
    }

    /// One channel spacing up, wrapping to the lower limit past the top.
    pub fn step_up(&self, khz: u32) -> u32 {
        let next = self.clamp(khz).saturating_add(self.spacing_khz);
        if next > self.upper_khz {
            self.lower_khz
        } else {
            next
        }
    }

    /// One channel spacing down, wrapping to the upper limit past the bottom.
    pub fn step_down(&self, khz: u32) -> u32 {
        let cur = self.clamp(khz);
        if cur < self.lower_khz + self.spacing_khz {
            self.upper_khz
        } else {
            cur - self.spacing_khz
        }
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            lower_khz: default_lower_khz(),
            upper_khz: default_upper_khz(),
            spacing_khz: default_spacing_khz(),
            default_khz: default_frequency_khz(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefs_file: default_prefs_file(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DozeConfig {
    fn default() -> Self {
        Self {
            handwave_gesture: default_handwave(),
        }
    }
}

fn default_lower_khz() -> u32 {
    87_500
}

fn default_upper_khz() -> u32 {
    108_000
}

fn default_spacing_khz() -> u32 {
    100
}

fn default_frequency_khz() -> u32 {
    98_100
}

fn default_prefs_file() -> PathBuf {
    platform::data_dir().join("prefs.json")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    platform::SESSION_TCP_PORT
}

fn default_handwave() -> bool {
    true
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
