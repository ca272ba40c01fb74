/*
 *  config.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  YAML configuration layered with command line overrides
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::collections::HashSet;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::line::Align;
use crate::display::options::LineOptions;
use crate::sources::TextEncoding;

pub const DEFAULT_ROWS: usize = 4;
pub const DEFAULT_COLUMNS: usize = 20;
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
pub const DEFAULT_I2C_ADDRESS: u8 = 0x27;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Run against the in-memory panel and log its contents
    pub emulated: Option<bool>,
    pub display: Option<DisplayConfig>,
    /// Replaced wholesale by a later layer, never merged line by line
    pub lines: Option<Vec<LineConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub driver: Option<DriverKind>,
    pub bus: Option<BusConfig>,
}

impl DisplayConfig {
    pub fn rows(&self) -> usize {
        self.rows.unwrap_or(DEFAULT_ROWS)
    }

    pub fn columns(&self) -> usize {
        self.columns.unwrap_or(DEFAULT_COLUMNS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusConfig {
    I2c {
        bus: String,  // e.g. "/dev/i2c-1"
        address: u8,  // PCF8574 backpacks sit at 0x27 or 0x3F
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Hd44780,
    Virtual,
}

/// What a configured line shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Clock,
    Text {
        text: String,
    },
    Mpd {
        host: Option<String>,
        port: Option<u16>,
        /// currentsong key, e.g. title, name, artist
        tag: String,
    },
    Lms {
        host: String,
        port: Option<u16>,
        /// player MAC, or "-"
        player: String,
        tag: String,
    },
    Fetch {
        url: String,
        encoding: Option<TextEncoding>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineConfig {
    pub name: String,
    pub row: usize,
    #[serde(flatten)]
    pub source: SourceConfig,
    #[serde(default)]
    pub options: LineOptions,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "lcdlines", about = "Independent text lines on one character LCD", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub rows: Option<usize>,
    #[arg(long)]
    pub columns: Option<usize>,
    /// I2C device, e.g. /dev/i2c-1
    #[arg(long)]
    pub i2c_bus: Option<String>,
    /// I2C address of the backpack, decimal or 0x prefixed hex
    #[arg(long, value_parser = parse_address)]
    pub i2c_address: Option<u8>,
    /// use the in-memory panel instead of hardware
    #[arg(long, action = ArgAction::SetTrue)]
    pub emulated: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{}': {}", s, e))
}

/// The lines shown when nothing is configured: clock, station, song, proverb.
pub fn default_lines() -> Vec<LineConfig> {
    vec![
        LineConfig {
            name: "time".into(),
            row: 1,
            source: SourceConfig::Clock,
            options: LineOptions::default(),
        },
        LineConfig {
            name: "station".into(),
            row: 2,
            source: SourceConfig::Mpd { host: None, port: None, tag: "name".into() },
            options: LineOptions::default().with_align(Align::Center),
        },
        LineConfig {
            name: "song".into(),
            row: 3,
            source: SourceConfig::Mpd { host: None, port: None, tag: "title".into() },
            options: LineOptions::default(),
        },
        LineConfig {
            name: "proverb".into(),
            row: 4,
            source: SourceConfig::Fetch {
                url: "http://sprichwortgenerator.de/plugin.php".into(),
                encoding: Some(TextEncoding::Latin1),
            },
            options: LineOptions::default(),
        },
    ]
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = build(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Defaults, then YAML, then CLI; validated.
pub fn build(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    apply_cli_overrides(&mut cfg, cli);

    if cfg.lines.is_none() {
        cfg.lines = Some(default_lines());
    }

    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lcdlines/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lcdlines/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lcdlines.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["lcdlines.yaml", "config.yaml", "config/lcdlines.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()  { dst.log_level = src.log_level; }
    if src.emulated.is_some()   { dst.emulated = src.emulated; }
    if src.lines.is_some()      { dst.lines = src.lines; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.rows.is_some()     { dst.rows = src.rows; }
    if src.columns.is_some()  { dst.columns = src.columns; }
    if src.driver.is_some()   { dst.driver = src.driver; }
    if src.bus.is_some()      { dst.bus = src.bus; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.emulated            { cfg.emulated = Some(true); }

    let any_display = cli.rows.is_some()
        || cli.columns.is_some()
        || cli.i2c_bus.is_some()
        || cli.i2c_address.is_some();
    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.rows.is_some()    { display.rows = cli.rows; }
        if cli.columns.is_some() { display.columns = cli.columns; }
        if cli.i2c_bus.is_some() || cli.i2c_address.is_some() {
            let (bus, address) = match display.bus.take() {
                Some(BusConfig::I2c { bus, address }) => (bus, address),
                None => (DEFAULT_I2C_BUS.to_string(), DEFAULT_I2C_ADDRESS),
            };
            display.bus = Some(BusConfig::I2c {
                bus: cli.i2c_bus.clone().unwrap_or(bus),
                address: cli.i2c_address.unwrap_or(address),
            });
        }
    }
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let display = cfg.display.clone().unwrap_or_default();
    let (rows, columns) = (display.rows(), display.columns());
    if !(1..=4).contains(&rows) {
        return Err(ConfigError::Validation(format!("display rows must be 1..=4, got {}", rows)));
    }
    if columns == 0 {
        return Err(ConfigError::Validation("display columns must be > 0".into()));
    }
    if let Some(BusConfig::I2c { address, .. }) = display.bus.as_ref() {
        if *address > 0x7F {
            return Err(ConfigError::Validation(format!(
                "I2C address 0x{:02X} is not a 7-bit address",
                address
            )));
        }
    }

    let mut names = HashSet::new();
    let mut used_rows = HashSet::new();
    for line in cfg.lines.iter().flatten() {
        if line.row < 1 || line.row > rows {
            return Err(ConfigError::Validation(format!(
                "line '{}': row {} is outside 1..={}",
                line.name, line.row, rows
            )));
        }
        if !names.insert(line.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate line name '{}'", line.name)));
        }
        if !used_rows.insert(line.row) {
            return Err(ConfigError::Validation(format!(
                "line '{}': row {} is used by another line",
                line.name, line.row
            )));
        }
        line.options
            .validate()
            .map_err(|e| ConfigError::Validation(format!("line '{}': {}", line.name, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: debug
display:
  rows: 4
  columns: 20
  driver: hd44780
  bus:
    type: i2c
    bus: /dev/i2c-1
    address: 39
lines:
  - name: time
    row: 1
    kind: clock
  - name: station
    row: 2
    kind: mpd
    tag: name
    options:
      align: center
  - name: now
    row: 3
    kind: lms
    host: lms.local
    player: "aa:bb:cc:dd:ee:ff"
    tag: title
    options:
      query_interval: 2.0
  - name: proverb
    row: 4
    kind: fetch
    url: http://example.com/proverb
"#;

    fn validated(s: &str) -> Result<Config, ConfigError> {
        let cfg = parse_yaml(s)?;
        validate(&cfg)?;
        Ok(cfg)
    }

    #[test]
    fn test_parse_sample() {
        let cfg = validated(SAMPLE).unwrap();
        let display = cfg.display.as_ref().unwrap();
        assert_eq!(display.driver, Some(DriverKind::Hd44780));
        assert_eq!(
            display.bus,
            Some(BusConfig::I2c { bus: "/dev/i2c-1".into(), address: 0x27 })
        );

        let lines = cfg.lines.as_ref().unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].source, SourceConfig::Clock);
        assert_eq!(lines[1].options.align, Align::Center);
        assert!(matches!(&lines[2].source, SourceConfig::Lms { port: None, .. }));
        assert_eq!(lines[2].options.query_interval, Some(2.0));
        assert!(matches!(&lines[3].source, SourceConfig::Fetch { encoding: None, .. }));
    }

    #[test]
    fn test_duplicate_row_rejected() {
        let yaml = "lines:\n  - {name: a, row: 1, kind: clock}\n  - {name: b, row: 1, kind: text, text: hi}\n";
        assert!(matches!(validated(yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let yaml = "lines:\n  - {name: a, row: 1, kind: clock}\n  - {name: a, row: 2, kind: text, text: hi}\n";
        assert!(matches!(validated(yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_geometry_rules() {
        assert!(validated("display: {rows: 5}\n").is_err());
        assert!(validated("display: {rows: 2, columns: 0}\n").is_err());
        assert!(validated("display: {rows: 2}\nlines:\n  - {name: a, row: 3, kind: clock}\n").is_err());
    }

    #[test]
    fn test_bad_interval_rejected() {
        let yaml = "lines:\n  - name: a\n    row: 1\n    kind: clock\n    options: {refresh_interval: 0}\n";
        assert!(validated(yaml).is_err());
    }

    #[test]
    fn test_unknown_kind_is_yaml_error() {
        let yaml = "lines:\n  - {name: a, row: 1, kind: radio}\n";
        assert!(matches!(parse_yaml(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_cli_overrides_and_defaults() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/lcdlines.yaml")),
            ..Cli::default()
        };
        assert!(build(&cli).is_err());

        let mut cfg = parse_yaml("display: {rows: 2}\n").unwrap();
        let cli = Cli {
            columns: Some(16),
            i2c_address: Some(0x3F),
            emulated: true,
            ..Cli::default()
        };
        apply_cli_overrides(&mut cfg, &cli);
        let display = cfg.display.as_ref().unwrap();
        assert_eq!((display.rows(), display.columns()), (2, 16));
        assert_eq!(
            display.bus,
            Some(BusConfig::I2c { bus: DEFAULT_I2C_BUS.into(), address: 0x3F })
        );
        assert_eq!(cfg.emulated, Some(true));
    }

    #[test]
    fn test_default_lines_are_valid() {
        let cfg = Config { lines: Some(default_lines()), ..Config::default() };
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x27"), Ok(0x27));
        assert_eq!(parse_address("63"), Ok(63));
        assert!(parse_address("0xZZ").is_err());
    }
}
