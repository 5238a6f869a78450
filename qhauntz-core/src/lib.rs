//! Qhauntz tabletop toolkit engine.
//!
//! This crate provides:
//! - The Qhauntz character model and its derived stats (skill pyramid,
//!   stress boxes, Aether tracks)
//! - A character editor that keeps pyramid assignments consistent
//! - A Fate dice roller and a searchable rules viewer
//! - A streaming game-master chat session backed by Claude
//!
//! # Quick Start
//!
//! ```ignore
//! use qhauntz_core::{ChatSession, ClaudeSource, GmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = ClaudeSource::from_env(GmConfig::default())?;
//!     let mut chat = ChatSession::new(source);
//!
//!     chat.send_message("Describe a bustling market in a Fyemyn city.").await?;
//!     if let Some(reply) = chat.messages().last() {
//!         println!("{}", reply.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod dice;
pub mod editor;
pub mod gm;
pub mod rules;
pub mod stats;
pub mod testing;

// Primary public API
pub use character::{
    Affinity, AffinitySlot, Character, CharacterField, ParseError, SkillName, SkillRating, Skills,
    Status, StatusDescription,
};
pub use dice::{DiceRoller, FateDiceRoll, FateDie, RollerState};
pub use editor::{CharacterEditor, EditorError};
pub use gm::{
    ChatError, ChatEvent, ChatSession, ChatState, ClaudeSource, GmConfig, Message, MessageId,
    Role, SourceError, TextSource,
};
pub use rules::{RulesViewer, NO_MATCHING_RULES, QHAUNTZ_RULES};
pub use stats::DerivedStats;
pub use testing::ScriptedSource;
