use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::time::Duration;

use rgb::RGB8;

use crate::font::FontSource;

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub display: DisplayConfig,
    pub network: NetworkConfig,
    pub render: RenderConfig,
    pub fonts: FontsConfig,
    pub lcd: LcdConfig,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: usize,
    pub height: usize,
    pub brightness: u8,

    /// Where scrolling text re-enters, defaults to just right of the display
    pub x_origin: Option<i32>,
    pub y_origin: i32,

    pub backend: Backend,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32,
            brightness: 100,
            x_origin: None,
            y_origin: 0,
            backend: Backend::default(),
        }
    }
}

impl DisplayConfig {
    pub fn x_origin(&self) -> i32 {
        self.x_origin
            .unwrap_or_else(|| i32::try_from(self.width).unwrap_or(i32::MAX).saturating_add(5))
    }
}

#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Headless,
    Ddp(DdpConfig),
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DdpConfig {
    pub host: IpAddr,
    #[serde(default = "default_ddp_port")]
    pub port: u16,
    #[serde(default)]
    pub udp_port: u16,
    #[serde(default)]
    pub layout: Layout,
}

fn default_ddp_port() -> u16 {
    4048
}

/// Order in which the panel expects its pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Rectangular,
    /// Every other row runs right to left.
    Serpentine,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub interface: IpAddr,
    pub text_port: u16,
    pub pixel_ascii_udp_port: u16,
    pub pixel_binary_port: u16,
    pub pixel_tcp_port: u16,
    pub lcd_port: u16,
    pub announce_port: u16,

    #[serde(with = "humantime_serde")]
    pub announce_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            text_port: 5001,
            pixel_ascii_udp_port: 5003,
            pixel_binary_port: 5004,
            pixel_tcp_port: 5004,
            lcd_port: 13666,
            announce_port: 5006,
            announce_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(with = "humantime_serde")]
    pub tick: Duration,

    pub flash_cycles: u32,

    #[serde(with = "humantime_serde")]
    pub flash_interval: Duration,

    /// Scroll position given to an overlay that moved up after pruning
    pub promote_offset: i32,

    #[serde(with = "humantime_serde")]
    pub fade_after: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
            flash_cycles: 5,
            flash_interval: Duration::from_millis(101),
            promote_offset: 8,
            fade_after: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub text: FontSource,
    pub lcd: FontSource,
    pub antialias: bool,
    pub search_dirs: Vec<camino::Utf8PathBuf>,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            text: FontSource::default(),
            lcd: FontSource::default(),
            antialias: true,
            search_dirs: vec![camino::Utf8PathBuf::from("/usr/share/fonts")],
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LcdConfig {
    pub cell_width: usize,
    pub cell_height: usize,

    /// Prepended to every widget text before rasterizing
    pub markup: String,

    #[serde(deserialize_with = "deserialize_color")]
    pub bar_color: RGB8,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            cell_width: 16,
            cell_height: 16,
            markup: String::from("$C00ff00$"),
            bar_color: RGB8::new(0, 0xff, 0),
        }
    }
}

fn deserialize_color<'de, D>(deserializer: D) -> Result<RGB8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = <String as serde::Deserialize>::deserialize(deserializer)?;
    crate::color::parse_hex_rgb(&s).map_err(serde::de::Error::custom)
}

impl Config {
    pub async fn load(path: &camino::Utf8Path) -> Result<Self, ConfigError> {
        let config_str =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadingFile {
                    path: path.to_path_buf(),
                    source,
                })?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.display.brightness) {
            return Err(ConfigError::Invalid(format!(
                "display.brightness must be within 1..=100, got {}",
                self.display.brightness
            )));
        }

        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid(String::from(
                "display.width and display.height must not be zero",
            )));
        }

        if self.lcd.cell_width == 0 || self.lcd.cell_height == 0 {
            return Err(ConfigError::Invalid(String::from(
                "lcd.cell_width and lcd.cell_height must not be zero",
            )));
        }

        if self.render.tick.is_zero() {
            return Err(ConfigError::Invalid(String::from(
                "render.tick must not be zero",
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from path '{}'", .path)]
    ReadingFile {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ParsingConfig(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
