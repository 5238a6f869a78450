//! Fate dice rolling.
//!
//! A Fate roll is four dice, each showing minus, blank or plus, summed to a
//! result between -4 and +4.

use crate::stats::ladder_name;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How long a roll stays "in the air" before its result is shown.
pub const DEFAULT_ROLL_DELAY: Duration = Duration::from_millis(500);

/// Number of dice in a Fate roll.
pub const DICE_PER_ROLL: usize = 4;

/// One face of a Fate die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FateDie {
    Minus,
    Blank,
    Plus,
}

impl FateDie {
    pub const FACES: [FateDie; 3] = [FateDie::Minus, FateDie::Blank, FateDie::Plus];

    pub fn value(&self) -> i8 {
        match self {
            FateDie::Minus => -1,
            FateDie::Blank => 0,
            FateDie::Plus => 1,
        }
    }

    pub fn from_value(value: i8) -> Option<FateDie> {
        match value {
            -1 => Some(FateDie::Minus),
            0 => Some(FateDie::Blank),
            1 => Some(FateDie::Plus),
            _ => None,
        }
    }

    /// Roll one die, each face equally likely.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> FateDie {
        Self::FACES[rng.gen_range(0..Self::FACES.len())]
    }
}

impl fmt::Display for FateDie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let face = match self {
            FateDie::Minus => "[-]",
            FateDie::Blank => "[ ]",
            FateDie::Plus => "[+]",
        };
        f.write_str(face)
    }
}

/// The four dice of a single Fate roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FateDiceRoll {
    dice: [FateDie; DICE_PER_ROLL],
}

impl FateDiceRoll {
    pub fn new(dice: [FateDie; DICE_PER_ROLL]) -> Self {
        Self { dice }
    }

    pub fn dice(&self) -> &[FateDie; DICE_PER_ROLL] {
        &self.dice
    }

    /// Sum of the four dice, between -4 and +4.
    pub fn total(&self) -> i8 {
        self.dice.iter().map(FateDie::value).sum()
    }

    /// Total with an explicit sign for positive results ("+2", "0", "-1").
    pub fn signed_total(&self) -> String {
        match self.total() {
            t if t > 0 => format!("+{t}"),
            t => t.to_string(),
        }
    }
}

impl fmt::Display for FateDiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces: Vec<String> = self.dice.iter().map(|d| d.to_string()).collect();
        write!(
            f,
            "{} = {} ({})",
            faces.join(" "),
            self.signed_total(),
            ladder_name(self.total())
        )
    }
}

/// Roll 4dF.
pub fn roll_fate_dice() -> FateDiceRoll {
    roll_fate_dice_with_rng(&mut rand::thread_rng())
}

/// Roll 4dF with a specific RNG (useful for testing).
pub fn roll_fate_dice_with_rng<R: Rng + ?Sized>(rng: &mut R) -> FateDiceRoll {
    FateDiceRoll::new(std::array::from_fn(|_| FateDie::roll(rng)))
}

/// Whether the roller is showing a result or waiting on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollerState {
    #[default]
    Ready,
    Rolling,
}

/// The dice screen: one visible roll at a time, revealed after a short pause.
#[derive(Debug, Clone)]
pub struct DiceRoller {
    delay: Duration,
    state: RollerState,
    last: Option<FateDiceRoll>,
}

impl DiceRoller {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_ROLL_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            state: RollerState::Ready,
            last: None,
        }
    }

    /// A roller that reveals results immediately.
    pub fn without_delay() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> RollerState {
        self.state
    }

    /// The visible roll. `None` before the first roll and while rolling.
    pub fn last_roll(&self) -> Option<&FateDiceRoll> {
        self.last.as_ref()
    }

    /// Roll 4dF, hiding the previous result until the new one is revealed.
    pub async fn roll(&mut self) -> FateDiceRoll {
        self.begin();
        self.pause().await;
        self.reveal(roll_fate_dice())
    }

    /// Like [`DiceRoller::roll`] with a specific RNG.
    pub async fn roll_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> FateDiceRoll {
        self.begin();
        self.pause().await;
        self.reveal(roll_fate_dice_with_rng(rng))
    }

    fn begin(&mut self) {
        self.state = RollerState::Rolling;
        self.last = None;
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn reveal(&mut self, roll: FateDiceRoll) -> FateDiceRoll {
        self.last = Some(roll);
        self.state = RollerState::Ready;
        tracing::debug!(total = roll.total(), "fate dice rolled");
        roll
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::new()
    }
}
