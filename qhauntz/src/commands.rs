//! Parsing of shell input lines.
//!
//! Lines starting with `#` are global commands. Anything else is read
//! according to the active tab.

use qhauntz_core::gm::PRESET_PROMPTS;
use qhauntz_core::{AffinitySlot, CharacterField, ParseError, SkillName, SkillRating, Status};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The four screens of the toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Character,
    Gm,
    Dice,
    Rules,
}

impl Tab {
    pub fn name(&self) -> &'static str {
        match self {
            Tab::Character => "character",
            Tab::Gm => "gm",
            Tab::Dice => "dice",
            Tab::Rules => "rules",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tab {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "character" | "char" | "sheet" => Ok(Tab::Character),
            "gm" | "assist" => Ok(Tab::Gm),
            "dice" | "roll" => Ok(Tab::Dice),
            "rules" => Ok(Tab::Rules),
            _ => Err(CommandError::UnknownTab(s.to_string())),
        }
    }
}

/// Edits and views on the character tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterCommand {
    SetField(CharacterField, String),
    SetStatus(Status),
    SetAffinityName(String),
    SetAffinity(AffinitySlot, Option<SkillName>),
    /// `slot` is zero-based.
    AssignPyramid {
        rating: SkillRating,
        slot: usize,
        skill: Option<SkillName>,
    },
    AddStunt,
    /// Index is zero-based.
    SetStunt(usize, String),
    RemoveStunt(usize),
    Show,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    SwitchTab(Tab),
    Character(CharacterCommand),
    Roll,
    Prompt(String),
    /// Index into [`PRESET_PROMPTS`].
    Preset(usize),
    Search(String),
    ClearSearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command: {0}. Type #help for help.")]
    Unknown(String),

    #[error("Unknown tab: {0} (try character, gm, dice or rules)")]
    UnknownTab(String),
}

/// Parse one input line for `tab`. Blank lines yield `None`.
pub fn parse(line: &str, tab: Tab) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(global) = line.strip_prefix('#') {
        return parse_global(global).map(Some);
    }

    let command = match tab {
        Tab::Character => Command::Character(parse_character(line)?),
        Tab::Gm => parse_gm(line)?,
        Tab::Dice => parse_dice(line)?,
        Tab::Rules => match line.to_lowercase().as_str() {
            "clear" => Command::ClearSearch,
            _ => Command::Search(line.to_string()),
        },
    };
    Ok(Some(command))
}

fn parse_global(line: &str) -> Result<Command, CommandError> {
    let (verb, rest) = split_verb(line);
    match verb.as_str() {
        "quit" | "exit" => Ok(Command::Quit),
        "help" => Ok(Command::Help),
        "tab" if rest.is_empty() => Err(CommandError::Usage("#tab <character|gm|dice|rules>")),
        "tab" => Ok(Command::SwitchTab(rest.parse()?)),
        _ => Err(CommandError::Unknown(format!("#{line}"))),
    }
}

fn parse_character(line: &str) -> Result<CharacterCommand, CommandError> {
    let (verb, rest) = split_verb(line);
    match verb.as_str() {
        "name" | "maxim" | "imperative" | "guild" => Ok(CharacterCommand::SetField(
            verb.parse()?,
            rest.to_string(),
        )),
        "status" if rest.is_empty() => Err(CommandError::Usage("status <name>")),
        "status" => Ok(CharacterCommand::SetStatus(rest.parse()?)),
        "affinity-name" => Ok(CharacterCommand::SetAffinityName(rest.to_string())),
        "affinity" => {
            let (slot, skill) = split_verb(rest);
            if slot.is_empty() || skill.is_empty() {
                return Err(CommandError::Usage(
                    "affinity <attack|defend|tend|noncombat> <skill|none>",
                ));
            }
            Ok(CharacterCommand::SetAffinity(slot.parse()?, parse_optional_skill(skill)?))
        }
        "pyramid" => parse_pyramid(rest),
        "stunt" => parse_stunt(rest),
        "show" => Ok(CharacterCommand::Show),
        "json" => Ok(CharacterCommand::Json),
        _ => Err(CommandError::Unknown(line.to_string())),
    }
}

const PYRAMID_USAGE: &str = "pyramid <rating 1-4> <slot> <skill|none>";

fn parse_pyramid(rest: &str) -> Result<CharacterCommand, CommandError> {
    let (rating, rest) = split_verb(rest);
    let (slot, skill) = split_verb(rest);
    if skill.is_empty() {
        return Err(CommandError::Usage(PYRAMID_USAGE));
    }

    let rating: u8 = rating
        .trim_start_matches('+')
        .parse()
        .map_err(|_| CommandError::Usage(PYRAMID_USAGE))?;
    let rating = SkillRating::try_from(rating)?;

    Ok(CharacterCommand::AssignPyramid {
        rating,
        slot: parse_position(&slot, PYRAMID_USAGE)?,
        skill: parse_optional_skill(skill)?,
    })
}

fn parse_stunt(rest: &str) -> Result<CharacterCommand, CommandError> {
    const USAGE: &str = "stunt add | stunt set <n> <text> | stunt rm <n>";

    let (action, rest) = split_verb(rest);
    match action.as_str() {
        "add" => Ok(CharacterCommand::AddStunt),
        "set" => {
            let (index, text) = split_verb(rest);
            Ok(CharacterCommand::SetStunt(
                parse_position(&index, USAGE)?,
                text.to_string(),
            ))
        }
        "rm" | "remove" => Ok(CharacterCommand::RemoveStunt(parse_position(rest, USAGE)?)),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_gm(line: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "preset <1-4>";

    let (verb, rest) = split_verb(line);
    if verb != "preset" {
        return Ok(Command::Prompt(line.to_string()));
    }
    let index = parse_position(rest, USAGE)?;
    if index >= PRESET_PROMPTS.len() {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(Command::Preset(index))
}

fn parse_dice(line: &str) -> Result<Command, CommandError> {
    match line.to_lowercase().as_str() {
        "roll" | "r" | "4df" => Ok(Command::Roll),
        _ => Err(CommandError::Unknown(line.to_string())),
    }
}

/// Lowercased first word and the trimmed remainder.
fn split_verb(line: &str) -> (String, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    }
}

/// A one-based position typed by the user, returned zero-based.
fn parse_position(text: &str, usage: &'static str) -> Result<usize, CommandError> {
    match text.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn parse_optional_skill(text: &str) -> Result<Option<SkillName>, CommandError> {
    match text.trim().to_lowercase().as_str() {
        "none" | "-" | "clear" => Ok(None),
        _ => Ok(Some(text.parse()?)),
    }
}
