use crate::framework::config::{
    parse_chance, parse_consistency, parse_elo, parse_elo_variance, parse_skill_variance,
    SettingsChange, SettingsError,
};
use std::str::FromStr;
use thiserror::Error;

/// Commands accepted on the interactive console
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Start,
    Stop,
    Status,
    Help,
    Quit,
    Change(SettingsChange),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?} (try \"help\")")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("expected on or off, got {0:?}")]
    InvalidToggle(String),
    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

pub const HELP_TEXT: &str = "\
commands:
  start | stop | status | quit
  enable | disable
  side <white|black>
  elo <n>
  color <#RRGGBB>
  legit <on|off>
  blunder <chance>       e.g. 0.1 or 10%
  suboptimal <chance>
  variance <0.0-1.0>
  consistency <0-100>
  elo-variance <n>";

fn parse_toggle(raw: &str) -> Result<bool, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(CommandError::InvalidToggle(raw.to_string())),
    }
}

impl FromStr for UserCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let joined = words.collect::<Vec<_>>().join(" ");
        let rest: &str = &joined;
        let argument = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(rest)
            }
        };

        let change = match verb.as_str() {
            "start" => return Ok(UserCommand::Start),
            "stop" => return Ok(UserCommand::Stop),
            "status" => return Ok(UserCommand::Status),
            "help" | "?" => return Ok(UserCommand::Help),
            "quit" | "exit" => return Ok(UserCommand::Quit),
            "enable" => SettingsChange::Enabled(true),
            "disable" => SettingsChange::Enabled(false),
            "side" => SettingsChange::Side(argument("side")?.parse()?),
            "elo" => SettingsChange::Elo(parse_elo(argument("elo")?)?),
            "color" | "colour" => SettingsChange::ArrowColor(argument("color")?.parse()?),
            "legit" => SettingsChange::LegitMode(parse_toggle(argument("legit")?)?),
            "blunder" => {
                SettingsChange::BlunderChance(parse_chance("blunder_chance", argument("blunder")?)?)
            }
            "suboptimal" => SettingsChange::SuboptimalChance(parse_chance(
                "suboptimal_chance",
                argument("suboptimal")?,
            )?),
            "variance" => SettingsChange::SkillVariance(parse_skill_variance(argument("variance")?)?),
            "consistency" => {
                SettingsChange::Consistency(parse_consistency(argument("consistency")?)?)
            }
            "elo-variance" => {
                SettingsChange::EloVariance(parse_elo_variance(argument("elo-variance")?)?)
            }
            _ => return Err(CommandError::Unknown(verb)),
        };
        Ok(UserCommand::Change(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::config::{Rgb, Side};

    #[test]
    fn test_lifecycle_commands() {
        assert_eq!("start".parse(), Ok(UserCommand::Start));
        assert_eq!("  STOP ".parse(), Ok(UserCommand::Stop));
        assert_eq!("status".parse(), Ok(UserCommand::Status));
        assert_eq!("exit".parse(), Ok(UserCommand::Quit));
    }

    #[test]
    fn test_settings_commands() {
        assert_eq!(
            "side black".parse(),
            Ok(UserCommand::Change(SettingsChange::Side(Side::Black)))
        );
        assert_eq!("elo 1500".parse(), Ok(UserCommand::Change(SettingsChange::Elo(1500))));
        assert_eq!(
            "color #FFFF80".parse(),
            Ok(UserCommand::Change(SettingsChange::ArrowColor(Rgb::new(0xFF, 0xFF, 0x80))))
        );
        assert_eq!("disable".parse(), Ok(UserCommand::Change(SettingsChange::Enabled(false))));
        assert_eq!(
            "legit on".parse(),
            Ok(UserCommand::Change(SettingsChange::LegitMode(true)))
        );
        assert_eq!(
            "blunder 10%".parse(),
            Ok(UserCommand::Change(SettingsChange::BlunderChance(0.1)))
        );
    }

    #[test]
    fn test_legit_variance_commands() {
        assert_eq!(
            "variance 0.25".parse(),
            Ok(UserCommand::Change(SettingsChange::SkillVariance(0.25)))
        );
        assert_eq!(
            "consistency 70".parse(),
            Ok(UserCommand::Change(SettingsChange::Consistency(70)))
        );
        assert_eq!(
            "elo-variance 200".parse(),
            Ok(UserCommand::Change(SettingsChange::EloVariance(200)))
        );
        assert!(matches!(
            "consistency 150".parse::<UserCommand>(),
            Err(CommandError::Invalid(SettingsError::OutOfRange { .. }))
        ));
        assert_eq!(
            "variance".parse::<UserCommand>(),
            Err(CommandError::MissingArgument("variance"))
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert_eq!("".parse::<UserCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "launch".parse::<UserCommand>(),
            Err(CommandError::Unknown("launch".to_string()))
        );
        assert_eq!("elo".parse::<UserCommand>(), Err(CommandError::MissingArgument("elo")));
        assert!(matches!(
            "elo -5".parse::<UserCommand>(),
            Err(CommandError::Invalid(SettingsError::InvalidElo(_)))
        ));
        assert!(matches!(
            "color 0080FF".parse::<UserCommand>(),
            Err(CommandError::Invalid(SettingsError::InvalidColor(_)))
        ));
        assert!(matches!(
            "legit maybe".parse::<UserCommand>(),
            Err(CommandError::InvalidToggle(_))
        ));
        assert!(matches!(
            "suboptimal 1.5".parse::<UserCommand>(),
            Err(CommandError::Invalid(SettingsError::ChanceOutOfRange { .. }))
        ));
    }
}
