//! Character editing.
//!
//! [`CharacterEditor`] owns the one character of a session and is the only
//! way to change it. Skill ratings can only be changed through pyramid
//! slot assignment, which clears the slot's previous occupant in the same
//! step, so a tier never gains a second skill through the editor.

use crate::character::{AffinitySlot, Character, CharacterField, SkillName, SkillRating, Status};
use crate::stats::{self, DerivedStats};
use thiserror::Error;

/// Errors from editing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("{skill} is not a magical skill and cannot be bound to an affinity")]
    NotMagical { skill: SkillName },

    #[error("No stunt at position {index} (the sheet has {len})")]
    StuntOutOfRange { index: usize, len: usize },

    #[error("{rating} has {capacity} slot(s), there is no slot {slot}")]
    SlotOutOfRange {
        rating: SkillRating,
        slot: usize,
        capacity: usize,
    },

    #[error("+0 is not a pyramid tier")]
    NotAPyramidTier,
}

/// Owns and edits a single character.
#[derive(Debug, Clone, Default)]
pub struct CharacterEditor {
    character: Character,
}

impl CharacterEditor {
    pub fn new(character: Character) -> Self {
        Self { character }
    }

    /// Current snapshot of the character.
    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn into_character(self) -> Character {
        self.character
    }

    /// Display aggregates for the current snapshot.
    pub fn derived(&self) -> DerivedStats {
        DerivedStats::compute(&self.character)
    }

    /// Replace one of the free-text identity fields.
    pub fn set_field(&mut self, field: CharacterField, text: impl Into<String>) {
        *self.character.field_mut(field) = text.into();
    }

    pub fn set_status(&mut self, status: Status) {
        self.character.status = status;
    }

    pub fn set_affinity_name(&mut self, name: impl Into<String>) {
        self.character.affinity.name = name.into();
    }

    /// Bind a magical skill to an affinity role, or clear it with `None`.
    ///
    /// The same skill may fill several roles.
    pub fn set_affinity_slot(
        &mut self,
        slot: AffinitySlot,
        skill: Option<SkillName>,
    ) -> Result<(), EditorError> {
        if let Some(skill) = skill {
            if !skill.is_magical() {
                return Err(EditorError::NotMagical { skill });
            }
        }
        *self.character.affinity.slot_mut(slot) = skill;
        Ok(())
    }

    pub(crate) fn set_skill_rating(&mut self, skill: SkillName, rating: SkillRating) {
        self.character.skills.set(skill, rating);
    }

    /// Put `skill` into slot `slot` of the `rating` tier, or empty the slot
    /// with `None`.
    ///
    /// Slots are numbered by the sheet order of the skills currently in the
    /// tier. Whatever skill held the slot drops to +0. A skill that already
    /// sits in another tier moves, vacating its old slot.
    pub fn assign_pyramid_slot(
        &mut self,
        rating: SkillRating,
        slot: usize,
        skill: Option<SkillName>,
    ) -> Result<(), EditorError> {
        let capacity = stats::pyramid_capacity(rating);
        if capacity == 0 {
            return Err(EditorError::NotAPyramidTier);
        }
        if slot >= capacity {
            return Err(EditorError::SlotOutOfRange {
                rating,
                slot,
                capacity,
            });
        }

        let occupant = stats::skills_at(&self.character.skills, rating)
            .get(slot)
            .copied();

        if let Some(old) = occupant {
            self.set_skill_rating(old, SkillRating::ZERO);
        }
        if let Some(new) = skill {
            self.set_skill_rating(new, rating);
        }

        tracing::debug!(%rating, slot, ?occupant, ?skill, "pyramid slot assigned");
        Ok(())
    }

    /// Append an empty stunt line and return its index.
    pub fn add_stunt(&mut self) -> usize {
        self.character.stunts.push(String::new());
        self.character.stunts.len() - 1
    }

    pub fn set_stunt_text(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), EditorError> {
        let len = self.character.stunts.len();
        let stunt = self
            .character
            .stunts
            .get_mut(index)
            .ok_or(EditorError::StuntOutOfRange { index, len })?;
        *stunt = text.into();
        Ok(())
    }

    /// Remove a stunt, keeping the order of the rest. Returns its text.
    pub fn remove_stunt(&mut self, index: usize) -> Result<String, EditorError> {
        let len = self.character.stunts.len();
        if index >= len {
            return Err(EditorError::StuntOutOfRange { index, len });
        }
        Ok(self.character.stunts.remove(index))
    }
}
