//! The Qhauntz character model.
//!
//! Pure data: skills, statuses, affinity and the free-text parts of a
//! character sheet. Derived values live in [`crate::stats`] and all edits go
//! through [`crate::editor::CharacterEditor`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for parsing names typed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
    #[error("Unknown affinity slot: {0}")]
    UnknownAffinitySlot(String),
    #[error("Unknown character field: {0}")]
    UnknownField(String),
    #[error("Skill rating {0} is out of range (0 to 4)")]
    RatingOutOfRange(u8),
}

/// Lowercase and strip separators so "Martial Arts", "martial-arts" and
/// "MartialArts" compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// Skills
// ============================================================================

/// The sixteen Qhauntz skills, in sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillName {
    Analysis,
    Compel,
    Conjuration,
    Empathy,
    Enhancement,
    Illusion,
    Mysticism,
    Perception,
    Suppression,
    Telekinesis,
    Teleportation,
    Will,
    Engineering,
    Marksmanship,
    #[serde(rename = "Martial Arts")]
    MartialArts,
    Physique,
}

impl SkillName {
    /// Every skill, magical first.
    pub const ALL: [SkillName; 16] = [
        SkillName::Analysis,
        SkillName::Compel,
        SkillName::Conjuration,
        SkillName::Empathy,
        SkillName::Enhancement,
        SkillName::Illusion,
        SkillName::Mysticism,
        SkillName::Perception,
        SkillName::Suppression,
        SkillName::Telekinesis,
        SkillName::Teleportation,
        SkillName::Will,
        SkillName::Engineering,
        SkillName::Marksmanship,
        SkillName::MartialArts,
        SkillName::Physique,
    ];

    /// Skills that feed the Aether pool and may be bound to an affinity.
    pub const MAGICAL: [SkillName; 12] = [
        SkillName::Analysis,
        SkillName::Compel,
        SkillName::Conjuration,
        SkillName::Empathy,
        SkillName::Enhancement,
        SkillName::Illusion,
        SkillName::Mysticism,
        SkillName::Perception,
        SkillName::Suppression,
        SkillName::Telekinesis,
        SkillName::Teleportation,
        SkillName::Will,
    ];

    pub const NON_MAGICAL: [SkillName; 4] = [
        SkillName::Engineering,
        SkillName::Marksmanship,
        SkillName::MartialArts,
        SkillName::Physique,
    ];

    pub fn is_magical(&self) -> bool {
        !matches!(
            self,
            SkillName::Engineering
                | SkillName::Marksmanship
                | SkillName::MartialArts
                | SkillName::Physique
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SkillName::Analysis => "Analysis",
            SkillName::Compel => "Compel",
            SkillName::Conjuration => "Conjuration",
            SkillName::Empathy => "Empathy",
            SkillName::Enhancement => "Enhancement",
            SkillName::Illusion => "Illusion",
            SkillName::Mysticism => "Mysticism",
            SkillName::Perception => "Perception",
            SkillName::Suppression => "Suppression",
            SkillName::Telekinesis => "Telekinesis",
            SkillName::Teleportation => "Teleportation",
            SkillName::Will => "Will",
            SkillName::Engineering => "Engineering",
            SkillName::Marksmanship => "Marksmanship",
            SkillName::MartialArts => "Martial Arts",
            SkillName::Physique => "Physique",
        }
    }
}

impl fmt::Display for SkillName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SkillName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        SkillName::ALL
            .iter()
            .copied()
            .find(|skill| normalize(skill.name()) == wanted)
            .ok_or_else(|| ParseError::UnknownSkill(s.trim().to_string()))
    }
}

/// A skill rating on the Fate ladder, from Mediocre (+0) to Great (+4).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct SkillRating(u8);

impl SkillRating {
    pub const ZERO: SkillRating = SkillRating(0);
    pub const MAX: SkillRating = SkillRating(4);

    /// Create a rating, or `None` if it lies outside 0..=4.
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX.0).then_some(SkillRating(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for SkillRating {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SkillRating::new(value).ok_or(ParseError::RatingOutOfRange(value))
    }
}

impl From<SkillRating> for u8 {
    fn from(rating: SkillRating) -> u8 {
        rating.0
    }
}

impl fmt::Display for SkillRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

/// Ratings for every skill. Skills missing from the map read as +0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skills {
    ratings: BTreeMap<SkillName, SkillRating>,
}

impl Skills {
    /// All sixteen skills at +0.
    pub fn new() -> Self {
        Self {
            ratings: SkillName::ALL
                .iter()
                .map(|&skill| (skill, SkillRating::ZERO))
                .collect(),
        }
    }

    pub fn rating(&self, skill: SkillName) -> SkillRating {
        self.ratings.get(&skill).copied().unwrap_or_default()
    }

    /// Every skill with its rating, in sheet order.
    pub fn iter(&self) -> impl Iterator<Item = (SkillName, SkillRating)> + '_ {
        SkillName::ALL
            .iter()
            .map(move |&skill| (skill, self.rating(skill)))
    }

    pub(crate) fn set(&mut self, skill: SkillName, rating: SkillRating) {
        self.ratings.insert(skill, rating);
    }
}

impl Default for Skills {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Status
// ============================================================================

/// The six Qhauntz statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Fyemyn,
    Ayrmyn,
    Tyrmyn,
    Fyrmyn,
    Ayxmyn,
    Nyhmyn,
}

/// Fixed reference text for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDescription {
    pub pronunciation: &'static str,
    pub core: &'static str,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Fyemyn,
        Status::Ayrmyn,
        Status::Tyrmyn,
        Status::Fyrmyn,
        Status::Ayxmyn,
        Status::Nyhmyn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Status::Fyemyn => "Fyemyn",
            Status::Ayrmyn => "Ayrmyn",
            Status::Tyrmyn => "Tyrmyn",
            Status::Fyrmyn => "Fyrmyn",
            Status::Ayxmyn => "Ayxmyn",
            Status::Nyhmyn => "Nyhmyn",
        }
    }

    pub fn description(&self) -> StatusDescription {
        let (pronunciation, core) = match self {
            Status::Fyemyn => (
                "Fay-men",
                "Pure Mage. Regenerates an additional lower Aether track each turn. Can use magic outside Affinity with a -1 penalty.",
            ),
            Status::Ayrmyn => (
                "Air-men",
                "Rune Golem. Gains +1 Resolve and +1 Aether track per Rune Stunt.",
            ),
            Status::Tyrmyn => (
                "Tear-men",
                "Rune User. Can use magic outside Affinity with a -1 penalty.",
            ),
            Status::Fyrmyn => (
                "Fear-men",
                "Restricted Rune User. Magical weapon actions costing 1-2 Aether are free. Cannot use magic outside their Affinity.",
            ),
            Status::Ayxmyn => (
                "X-men",
                "Pacified Rune User. Gains +1 Endurance and +1 Resolve track per Rune Stunt. Can only use skills from their Affinity.",
            ),
            Status::Nyhmyn => (
                "Nigh-men",
                "Magic Sponge/Tank. Absorbs magical energy to fuel physical prowess. See special rules.",
            ),
        };
        StatusDescription {
            pronunciation,
            core,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Status::ALL
            .iter()
            .copied()
            .find(|status| normalize(status.name()) == wanted)
            .ok_or_else(|| ParseError::UnknownStatus(s.trim().to_string()))
    }
}

// ============================================================================
// Affinity
// ============================================================================

/// The four roles a character's magic is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffinitySlot {
    Attack,
    Defend,
    Tend,
    NonCombat,
}

impl AffinitySlot {
    pub const ALL: [AffinitySlot; 4] = [
        AffinitySlot::Attack,
        AffinitySlot::Defend,
        AffinitySlot::Tend,
        AffinitySlot::NonCombat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AffinitySlot::Attack => "Attack",
            AffinitySlot::Defend => "Defend",
            AffinitySlot::Tend => "Tend",
            AffinitySlot::NonCombat => "Non-Combat",
        }
    }
}

impl FromStr for AffinitySlot {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "attack" => Ok(AffinitySlot::Attack),
            "defend" => Ok(AffinitySlot::Defend),
            "tend" => Ok(AffinitySlot::Tend),
            "noncombat" => Ok(AffinitySlot::NonCombat),
            _ => Err(ParseError::UnknownAffinitySlot(s.trim().to_string())),
        }
    }
}

/// A named affinity with one magical skill per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affinity {
    pub name: String,
    pub attack: Option<SkillName>,
    pub defend: Option<SkillName>,
    pub tend: Option<SkillName>,
    pub non_combat: Option<SkillName>,
}

impl Affinity {
    pub fn slot(&self, slot: AffinitySlot) -> Option<SkillName> {
        match slot {
            AffinitySlot::Attack => self.attack,
            AffinitySlot::Defend => self.defend,
            AffinitySlot::Tend => self.tend,
            AffinitySlot::NonCombat => self.non_combat,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: AffinitySlot) -> &mut Option<SkillName> {
        match slot {
            AffinitySlot::Attack => &mut self.attack,
            AffinitySlot::Defend => &mut self.defend,
            AffinitySlot::Tend => &mut self.tend,
            AffinitySlot::NonCombat => &mut self.non_combat,
        }
    }
}

// ============================================================================
// Stress and consequences
// ============================================================================

/// Checked stress boxes per track. Not yet driven by any rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressTracks {
    pub endurance: Vec<u8>,
    pub resolve: Vec<u8>,
}

/// How many shifts a consequence absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsequenceSeverity {
    Mild,
    Moderate,
    Severe,
}

impl ConsequenceSeverity {
    pub fn shifts(&self) -> u8 {
        match self {
            ConsequenceSeverity::Mild => 2,
            ConsequenceSeverity::Moderate => 4,
            ConsequenceSeverity::Severe => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consequence {
    pub severity: ConsequenceSeverity,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consequences {
    pub endurance: Vec<Consequence>,
    pub resolve: Vec<Consequence>,
}

// ============================================================================
// Character
// ============================================================================

/// The free-text identity fields of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterField {
    Name,
    Maxim,
    Imperative,
    Guild,
}

impl CharacterField {
    pub const ALL: [CharacterField; 4] = [
        CharacterField::Name,
        CharacterField::Maxim,
        CharacterField::Imperative,
        CharacterField::Guild,
    ];

    /// Sheet label, including the Fate aspect each field stands for.
    pub fn label(&self) -> &'static str {
        match self {
            CharacterField::Name => "Name",
            CharacterField::Maxim => "Maxim (High Concept)",
            CharacterField::Imperative => "Imperative (Trouble)",
            CharacterField::Guild => "Guild",
        }
    }
}

impl FromStr for CharacterField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "name" => Ok(CharacterField::Name),
            "maxim" => Ok(CharacterField::Maxim),
            "imperative" => Ok(CharacterField::Imperative),
            "guild" => Ok(CharacterField::Guild),
            _ => Err(ParseError::UnknownField(s.trim().to_string())),
        }
    }
}

/// A Qhauntz player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub maxim: String,
    pub imperative: String,
    pub guild: String,
    pub status: Status,
    pub affinity: Affinity,
    pub skills: Skills,
    pub stunts: Vec<String>,
    #[serde(default)]
    pub stress: StressTracks,
    #[serde(default)]
    pub consequences: Consequences,
}

impl Character {
    /// A fresh sheet: every skill at +0, two empty stunt lines.
    pub fn blank() -> Self {
        Self {
            name: String::new(),
            maxim: String::new(),
            imperative: String::new(),
            guild: String::new(),
            status: Status::default(),
            affinity: Affinity::default(),
            skills: Skills::new(),
            stunts: vec![String::new(), String::new()],
            stress: StressTracks::default(),
            consequences: Consequences::default(),
        }
    }

    pub fn field(&self, field: CharacterField) -> &str {
        match field {
            CharacterField::Name => &self.name,
            CharacterField::Maxim => &self.maxim,
            CharacterField::Imperative => &self.imperative,
            CharacterField::Guild => &self.guild,
        }
    }

    pub(crate) fn field_mut(&mut self, field: CharacterField) -> &mut String {
        match field {
            CharacterField::Name => &mut self.name,
            CharacterField::Maxim => &mut self.maxim,
            CharacterField::Imperative => &mut self.imperative,
            CharacterField::Guild => &mut self.guild,
        }
    }
}

impl Default for Character {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_sets() {
        assert_eq!(SkillName::ALL.len(), 16);
        assert!(SkillName::MAGICAL.iter().all(|s| s.is_magical()));
        assert!(SkillName::NON_MAGICAL.iter().all(|s| !s.is_magical()));

        // ALL is magical followed by non-magical, in that order
        let joined: Vec<_> = SkillName::MAGICAL
            .iter()
            .chain(SkillName::NON_MAGICAL.iter())
            .copied()
            .collect();
        assert_eq!(joined, SkillName::ALL.to_vec());
    }

    #[test]
    fn test_parse_skill_names() {
        assert_eq!("Will".parse::<SkillName>().unwrap(), SkillName::Will);
        assert_eq!(
            "martial arts".parse::<SkillName>().unwrap(),
            SkillName::MartialArts
        );
        assert_eq!(
            "MartialArts".parse::<SkillName>().unwrap(),
            SkillName::MartialArts
        );
        assert_eq!(
            "Necromancy".parse::<SkillName>(),
            Err(ParseError::UnknownSkill("Necromancy".to_string()))
        );
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(SkillRating::new(0), Some(SkillRating::ZERO));
        assert_eq!(SkillRating::new(4), Some(SkillRating::MAX));
        assert_eq!(SkillRating::new(5), None);
        assert_eq!(SkillRating::try_from(9u8), Err(ParseError::RatingOutOfRange(9)));
        assert_eq!(SkillRating::MAX.to_string(), "+4");
    }

    #[test]
    fn test_rating_rejected_when_deserializing() {
        let ok: Result<Skills, _> = serde_json::from_str(r#"{"Will": 3}"#);
        assert_eq!(ok.unwrap().rating(SkillName::Will).value(), 3);

        let bad: Result<Skills, _> = serde_json::from_str(r#"{"Will": 5}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_skills_default_and_missing_entries() {
        let skills = Skills::new();
        assert_eq!(skills.iter().count(), 16);
        assert!(skills.iter().all(|(_, r)| r.is_zero()));

        let sparse: Skills = serde_json::from_str(r#"{"Martial Arts": 2}"#).unwrap();
        assert_eq!(sparse.rating(SkillName::MartialArts).value(), 2);
        assert_eq!(sparse.rating(SkillName::Physique), SkillRating::ZERO);
        assert_eq!(sparse.iter().count(), 16);
    }

    #[test]
    fn test_status_lookup() {
        assert_eq!(Status::default(), Status::Fyemyn);
        assert_eq!(Status::ALL.len(), 6);
        assert_eq!("nyhmyn".parse::<Status>().unwrap(), Status::Nyhmyn);
        assert!("Elf".parse::<Status>().is_err());

        let desc = Status::Ayxmyn.description();
        assert_eq!(desc.pronunciation, "X-men");
        assert!(desc.core.starts_with("Pacified Rune User."));
        assert!(Status::ALL
            .iter()
            .all(|s| !s.description().core.is_empty()));
    }

    #[test]
    fn test_affinity_slots() {
        assert_eq!(
            "non-combat".parse::<AffinitySlot>().unwrap(),
            AffinitySlot::NonCombat
        );
        assert_eq!(
            "nonCombat".parse::<AffinitySlot>().unwrap(),
            AffinitySlot::NonCombat
        );

        let mut affinity = Affinity::default();
        *affinity.slot_mut(AffinitySlot::Tend) = Some(SkillName::Empathy);
        assert_eq!(affinity.tend, Some(SkillName::Empathy));
        assert_eq!(affinity.slot(AffinitySlot::Attack), None);
    }

    #[test]
    fn test_blank_character() {
        let character = Character::blank();
        assert_eq!(character.status, Status::Fyemyn);
        assert_eq!(character.stunts, vec![String::new(), String::new()]);
        assert!(character.stress.endurance.is_empty());
        assert!(character.consequences.resolve.is_empty());
        assert!(CharacterField::ALL
            .iter()
            .all(|&f| character.field(f).is_empty()));
    }

    #[test]
    fn test_consequence_shifts() {
        assert_eq!(ConsequenceSeverity::Mild.shifts(), 2);
        assert_eq!(ConsequenceSeverity::Moderate.shifts(), 4);
        assert_eq!(ConsequenceSeverity::Severe.shifts(), 6);
    }
}
