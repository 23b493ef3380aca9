//! Engine settings and the store that hands them to the engine process.

pub mod settings;
pub mod store;

pub use settings::{
    parse_chance, parse_consistency, parse_elo, parse_elo_variance, parse_skill_variance,
    EngineSettings, Rgb, SettingsChange, SettingsError, Side,
};
pub use store::{ConfigError, ConfigStore};
