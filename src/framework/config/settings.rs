use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("elo must be a non-negative integer, got {0:?}")]
    InvalidElo(String),
    #[error("side must be \"white\" or \"black\", got {0:?}")]
    InvalidSide(String),
    #[error("colour must look like #RRGGBB, got {0:?}")]
    InvalidColor(String),
    #[error("{name} must be a probability between 0 and 1, got {value}")]
    ChanceOutOfRange { name: &'static str, value: f64 },
    #[error("{name} must be a number, got {raw:?}")]
    InvalidChance { name: &'static str, raw: String },
    #[error("{name} must be a non-negative integer, got {raw:?}")]
    InvalidCount { name: &'static str, raw: String },
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Upper bound of the `consistency` scale
pub const MAX_CONSISTENCY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    White,
    Black,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Side::White),
            "black" | "b" => Ok(Side::Black),
            _ => Err(SettingsError::InvalidSide(s.to_string())),
        }
    }
}

/// 24-bit colour, serialised as `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsError::InvalidColor(s.to_string());
        let hex_digits = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex_digits.len() != 6 || !hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex_digits[range], 16).map_err(|_| invalid())
        };
        Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = SettingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Parse user-entered elo text. Rejects negatives and non-integers.
pub fn parse_elo(raw: &str) -> Result<u32, SettingsError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| SettingsError::InvalidElo(raw.to_string()))
}

/// Parse a probability expressed either as a fraction (`0.15`) or a
/// percentage (`15%`).
pub fn parse_chance(name: &'static str, raw: &str) -> Result<f64, SettingsError> {
    let trimmed = raw.trim();
    let value = match trimmed.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().map(|p| p / 100.0),
        None => trimmed.parse::<f64>(),
    }
    .map_err(|_| SettingsError::InvalidChance {
        name,
        raw: raw.to_string(),
    })?;
    check_chance(name, value)
}

/// Parse the legit-mode skill variance, a fraction between 0 and 1
pub fn parse_skill_variance(raw: &str) -> Result<f64, SettingsError> {
    let value = raw.trim().parse::<f64>().map_err(|_| SettingsError::InvalidChance {
        name: "skill_variance",
        raw: raw.to_string(),
    })?;
    check_skill_variance(value)
}

/// Parse the legit-mode consistency, 0 to 100
pub fn parse_consistency(raw: &str) -> Result<u32, SettingsError> {
    check_consistency(parse_count("consistency", raw)?)
}

/// Parse the legit-mode elo variance, in elo points
pub fn parse_elo_variance(raw: &str) -> Result<u32, SettingsError> {
    parse_count("elo_variance", raw)
}

fn parse_count(name: &'static str, raw: &str) -> Result<u32, SettingsError> {
    raw.trim().parse::<u32>().map_err(|_| SettingsError::InvalidCount {
        name,
        raw: raw.to_string(),
    })
}

fn check_skill_variance(value: f64) -> Result<f64, SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::OutOfRange {
            name: "skill_variance",
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

fn check_consistency(value: u32) -> Result<u32, SettingsError> {
    if value <= MAX_CONSISTENCY {
        Ok(value)
    } else {
        Err(SettingsError::OutOfRange {
            name: "consistency",
            value: value as f64,
            min: 0.0,
            max: MAX_CONSISTENCY as f64,
        })
    }
}

fn check_chance(name: &'static str, value: f64) -> Result<f64, SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::ChanceOutOfRange { name, value })
    }
}

/// Settings handed to the engine through the settings file.
///
/// The four mandatory keys always serialise; the legit-mode keys (toggle,
/// blunder and suboptimal chances, skill variance, consistency, elo
/// variance) only when they have been set, so a plain snapshot produces exactly
/// `{"enabled":..,"side":..,"elo":..,"arrow_color":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub enabled: bool,
    pub side: Side,
    pub elo: u32,
    pub arrow_color: Rgb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legit_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blunder_chance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suboptimal_chance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_variance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elo_variance: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            side: Side::White,
            elo: 2000,
            arrow_color: Rgb::new(0x00, 0x80, 0xFF),
            legit_mode: None,
            blunder_chance: None,
            suboptimal_chance: None,
            skill_variance: None,
            consistency: None,
            elo_variance: None,
        }
    }
}

/// A single user adjustment to the current settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsChange {
    Enabled(bool),
    Side(Side),
    Elo(u32),
    ArrowColor(Rgb),
    LegitMode(bool),
    BlunderChance(f64),
    SuboptimalChance(f64),
    SkillVariance(f64),
    Consistency(u32),
    EloVariance(u32),
}

impl EngineSettings {
    /// Apply a change, returning whether the snapshot actually differs
    /// afterwards.
    pub fn apply(&mut self, change: SettingsChange) -> Result<bool, SettingsError> {
        let before = self.clone();
        match change {
            SettingsChange::Enabled(enabled) => self.enabled = enabled,
            SettingsChange::Side(side) => self.side = side,
            SettingsChange::Elo(elo) => self.elo = elo,
            SettingsChange::ArrowColor(color) => self.arrow_color = color,
            SettingsChange::LegitMode(on) => self.legit_mode = Some(on),
            SettingsChange::BlunderChance(value) => {
                self.blunder_chance = Some(check_chance("blunder_chance", value)?)
            }
            SettingsChange::SuboptimalChance(value) => {
                self.suboptimal_chance = Some(check_chance("suboptimal_chance", value)?)
            }
            SettingsChange::SkillVariance(value) => {
                self.skill_variance = Some(check_skill_variance(value)?)
            }
            SettingsChange::Consistency(value) => self.consistency = Some(check_consistency(value)?),
            SettingsChange::EloVariance(value) => self.elo_variance = Some(value),
        }
        Ok(*self != before)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "enabled={} side={} elo={} arrow_color={}",
            self.enabled, self.side, self.elo, self.arrow_color
        );
        if let Some(legit) = self.legit_mode {
            summary.push_str(&format!(" legit_mode={}", legit));
        }
        if let Some(chance) = self.blunder_chance {
            summary.push_str(&format!(" blunder_chance={:.2}", chance));
        }
        if let Some(chance) = self.suboptimal_chance {
            summary.push_str(&format!(" suboptimal_chance={:.2}", chance));
        }
        if let Some(variance) = self.skill_variance {
            summary.push_str(&format!(" skill_variance={:.2}", variance));
        }
        if let Some(consistency) = self.consistency {
            summary.push_str(&format!(" consistency={}", consistency));
        }
        if let Some(variance) = self.elo_variance {
            summary.push_str(&format!(" elo_variance={}", variance));
        }
        summary
    }
}
