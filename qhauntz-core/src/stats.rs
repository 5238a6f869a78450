//! Derived values for the character sheet.
//!
//! Everything here is a pure function of the current skill ratings. Nothing
//! is cached on the character; callers recompute after each edit.

use crate::character::{Character, SkillName, SkillRating, Skills};

/// Stress boxes every character has before skill bonuses.
pub const BASE_STRESS_BOXES: u8 = 2;

/// Highest Aether track a character can unlock.
pub const MAX_AETHER_TRACKS: u8 = 10;

/// Skill pyramid capacity as (rating, slots), highest rating first.
pub const PYRAMID_SLOTS: [(u8, usize); 4] = [(4, 1), (3, 2), (2, 3), (1, 4)];

/// How many skills may hold `rating`. Zero for +0, which is unlimited and
/// not part of the pyramid.
pub fn pyramid_capacity(rating: SkillRating) -> usize {
    PYRAMID_SLOTS
        .iter()
        .find(|(r, _)| *r == rating.value())
        .map(|(_, slots)| *slots)
        .unwrap_or(0)
}

/// Total of all sixteen ratings.
pub fn skill_points(skills: &Skills) -> u32 {
    skills.iter().map(|(_, r)| u32::from(r.value())).sum()
}

/// Total of the twelve magical ratings.
pub fn magical_skill_points(skills: &Skills) -> u32 {
    SkillName::MAGICAL
        .iter()
        .map(|&skill| u32::from(skills.rating(skill).value()))
        .sum()
}

/// Unlocked Aether tracks for a pool of magical skill points.
///
/// Track `n` costs `n` points on top of the tracks before it, so `n` tracks
/// need the triangular number `n(n+1)/2`.
pub fn aether_tracks(points: u32) -> Vec<u8> {
    let mut tracks = Vec::new();
    let mut remaining = i64::from(points);

    for track in 1..=MAX_AETHER_TRACKS {
        remaining -= i64::from(track);
        if remaining < 0 {
            break;
        }
        tracks.push(track);
    }

    tracks
}

/// Stress boxes granted by a governing skill rating.
///
/// The +3 step at rating 5 cannot be reached while ratings cap at +4; it is
/// kept so the table survives a higher cap.
pub fn stress_boxes(rating: u8) -> u8 {
    let bonus = match rating {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        _ => 3,
    };
    BASE_STRESS_BOXES + bonus
}

/// Endurance boxes, governed by Physique.
pub fn endurance_boxes(skills: &Skills) -> u8 {
    stress_boxes(skills.rating(SkillName::Physique).value())
}

/// Resolve boxes, governed by Will.
pub fn resolve_boxes(skills: &Skills) -> u8 {
    stress_boxes(skills.rating(SkillName::Will).value())
}

/// Skills currently holding `rating`, in sheet order.
///
/// The position of a skill in this list is its slot index within the tier.
pub fn skills_at(skills: &Skills, rating: SkillRating) -> Vec<SkillName> {
    skills
        .iter()
        .filter(|(_, r)| *r == rating)
        .map(|(skill, _)| skill)
        .collect()
}

/// Skills left at Mediocre (+0).
pub fn mediocre_skills(skills: &Skills) -> Vec<SkillName> {
    skills_at(skills, SkillRating::ZERO)
}

/// Occupancy of one tier of the skill pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidTier {
    pub rating: SkillRating,
    pub filled: usize,
    pub capacity: usize,
}

impl PyramidTier {
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.filled)
    }

    pub fn is_over_capacity(&self) -> bool {
        self.filled > self.capacity
    }

    /// Heading such as "Great (+4)".
    pub fn label(&self) -> String {
        let value = self.rating.value();
        format!("{} (+{value})", ladder_name(value as i8))
    }
}

/// Occupancy of every pyramid tier, highest first.
pub fn pyramid(skills: &Skills) -> [PyramidTier; 4] {
    PYRAMID_SLOTS.map(|(value, capacity)| {
        let rating = SkillRating::new(value).unwrap_or_default();
        PyramidTier {
            rating,
            filled: skills.iter().filter(|(_, r)| *r == rating).count(),
            capacity,
        }
    })
}

/// Name of a value on the Fate ladder. Values past either end clamp.
pub fn ladder_name(value: i8) -> &'static str {
    match value {
        i8::MIN..=-2 => "Terrible",
        -1 => "Poor",
        0 => "Mediocre",
        1 => "Average",
        2 => "Fair",
        3 => "Good",
        4 => "Great",
        5 => "Superb",
        6 => "Fantastic",
        7 => "Epic",
        _ => "Legendary",
    }
}

/// Every display aggregate for one character snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedStats {
    pub skill_points: u32,
    pub magical_skill_points: u32,
    pub aether_tracks: Vec<u8>,
    pub endurance_boxes: u8,
    pub resolve_boxes: u8,
    pub pyramid: [PyramidTier; 4],
}

impl DerivedStats {
    pub fn compute(character: &Character) -> Self {
        let skills = &character.skills;
        let magical_skill_points = magical_skill_points(skills);

        Self {
            skill_points: skill_points(skills),
            magical_skill_points,
            aether_tracks: aether_tracks(magical_skill_points),
            endurance_boxes: endurance_boxes(skills),
            resolve_boxes: resolve_boxes(skills),
            pyramid: pyramid(skills),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rated(pairs: &[(SkillName, u8)]) -> Skills {
        let mut skills = Skills::new();
        for &(skill, value) in pairs {
            skills.set(skill, SkillRating::new(value).unwrap());
        }
        skills
    }

    #[test]
    fn test_point_totals() {
        let skills = rated(&[
            (SkillName::Will, 4),
            (SkillName::Physique, 3),
            (SkillName::Illusion, 3),
            (SkillName::Engineering, 1),
        ]);

        assert_eq!(skill_points(&skills), 11);
        assert_eq!(magical_skill_points(&skills), 7);
        assert_eq!(skill_points(&Skills::new()), 0);
    }

    #[test]
    fn test_magical_never_exceeds_total() {
        for (i, &skill) in SkillName::ALL.iter().enumerate() {
            let skills = rated(&[(skill, (i % 4) as u8 + 1)]);
            assert!(magical_skill_points(&skills) <= skill_points(&skills));
        }
    }

    #[test]
    fn test_aether_tracks_examples() {
        assert_eq!(aether_tracks(0), Vec::<u8>::new());
        assert_eq!(aether_tracks(1), vec![1]);
        assert_eq!(aether_tracks(2), vec![1]);
        assert_eq!(aether_tracks(3), vec![1, 2]);
        assert_eq!(aether_tracks(6), vec![1, 2, 3]);
        assert_eq!(aether_tracks(9), vec![1, 2, 3]);
        assert_eq!(aether_tracks(10), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_aether_tracks_triangular_bound() {
        for points in 0..=70u32 {
            let tracks = aether_tracks(points);
            let n = tracks.len() as u32;

            assert_eq!(tracks, (1..=n as u8).collect::<Vec<_>>());
            assert!(n * (n + 1) / 2 <= points);
            if n < u32::from(MAX_AETHER_TRACKS) {
                assert!((n + 1) * (n + 2) / 2 > points);
            }
        }
        assert_eq!(aether_tracks(1_000).len(), 10);
    }

    #[test]
    fn test_endurance_boxes() {
        let boxes = |value| endurance_boxes(&rated(&[(SkillName::Physique, value)]));
        assert_eq!(boxes(0), 2);
        assert_eq!(boxes(1), 3);
        assert_eq!(boxes(2), 3);
        assert_eq!(boxes(3), 4);
        // Ratings cap at +4, so endurance tops out at four boxes
        assert_eq!(boxes(4), 4);
    }

    #[test]
    fn test_resolve_boxes_follow_will() {
        let skills = rated(&[(SkillName::Will, 3), (SkillName::Physique, 1)]);
        assert_eq!(resolve_boxes(&skills), 4);
        assert_eq!(endurance_boxes(&skills), 3);
    }

    #[test]
    fn test_stress_step_above_cap() {
        assert_eq!(stress_boxes(5), 5);
        assert_eq!(stress_boxes(9), 5);
    }

    #[test]
    fn test_pyramid_occupancy() {
        let skills = rated(&[
            (SkillName::Will, 4),
            (SkillName::Physique, 3),
            (SkillName::Engineering, 1),
            (SkillName::Compel, 1),
        ]);
        let tiers = pyramid(&skills);

        assert_eq!(tiers[0].rating.value(), 4);
        assert_eq!((tiers[0].filled, tiers[0].remaining()), (1, 0));
        assert_eq!((tiers[1].filled, tiers[1].remaining()), (1, 1));
        assert_eq!((tiers[2].filled, tiers[2].remaining()), (0, 3));
        assert_eq!((tiers[3].filled, tiers[3].remaining()), (2, 2));
        assert!(tiers.iter().all(|t| !t.is_over_capacity()));
        assert_eq!(tiers[0].label(), "Great (+4)");
        assert_eq!(tiers[3].label(), "Average (+1)");
    }

    #[test]
    fn test_pyramid_reports_overflow() {
        let skills = rated(&[(SkillName::Will, 4), (SkillName::Compel, 4)]);
        let top = pyramid(&skills)[0];
        assert!(top.is_over_capacity());
        assert_eq!(top.remaining(), 0);
    }

    #[test]
    fn test_skills_at_uses_sheet_order() {
        let skills = rated(&[(SkillName::Physique, 2), (SkillName::Analysis, 2)]);
        assert_eq!(
            skills_at(&skills, SkillRating::new(2).unwrap()),
            vec![SkillName::Analysis, SkillName::Physique]
        );
        assert_eq!(mediocre_skills(&skills).len(), 14);
    }

    #[test]
    fn test_capacity_table() {
        assert_eq!(pyramid_capacity(SkillRating::MAX), 1);
        assert_eq!(pyramid_capacity(SkillRating::new(1).unwrap()), 4);
        assert_eq!(pyramid_capacity(SkillRating::ZERO), 0);
    }

    #[test]
    fn test_ladder_names() {
        assert_eq!(ladder_name(-4), "Terrible");
        assert_eq!(ladder_name(-1), "Poor");
        assert_eq!(ladder_name(0), "Mediocre");
        assert_eq!(ladder_name(2), "Fair");
        assert_eq!(ladder_name(8), "Legendary");
        assert_eq!(ladder_name(12), "Legendary");
    }

    #[test]
    fn test_derived_stats_for_blank_character() {
        let stats = DerivedStats::compute(&Character::blank());
        assert_eq!(stats.skill_points, 0);
        assert!(stats.aether_tracks.is_empty());
        assert_eq!(stats.endurance_boxes, 2);
        assert_eq!(stats.resolve_boxes, 2);
        assert_eq!(stats.pyramid.iter().map(|t| t.remaining()).sum::<usize>(), 10);
    }
}
