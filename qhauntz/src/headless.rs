//! Line-oriented shell for the toolkit.
//!
//! The shell owns the session's single character, the dice roller, the
//! rules viewer and the GM chat, and routes each input line to the active
//! tab. Output lines are tagged (`[CHARACTER]`, `[GM]`, `[DICE]`, `[RULES]`,
//! `[ERROR]`) so the protocol is easy to script against.

use crate::commands::{self, CharacterCommand, Command, Tab};
use qhauntz_core::gm::PRESET_PROMPTS;
use qhauntz_core::stats;
use qhauntz_core::{
    AffinitySlot, CharacterEditor, CharacterField, ChatEvent, ChatSession, ClaudeSource,
    DiceRoller, GmConfig, RulesViewer, TextSource,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Settings taken from the command line and environment.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub model: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub roll_delay: bool,
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Failed to read rules from {}: {source}", path.display())]
    Rules {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Whether the shell should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run the shell on stdin/stdout until `#quit` or end of input.
pub async fn run_headless(config: ShellConfig) -> Result<(), ShellError> {
    let rules = match &config.rules_path {
        Some(path) => {
            let document = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ShellError::Rules {
                    path: path.clone(),
                    source,
                })?;
            RulesViewer::with_document(document)
        }
        None => RulesViewer::new(),
    };

    let mut gm_config = GmConfig::default();
    if let Some(model) = &config.model {
        gm_config = gm_config.with_model(model);
    }
    let chat = match ClaudeSource::from_env(gm_config) {
        Ok(source) => Ok(ChatSession::new(source)),
        Err(e) => {
            tracing::info!(error = %e, "GM assistant unavailable");
            Err(e.to_string())
        }
    };

    let dice = if config.roll_delay {
        DiceRoller::new()
    } else {
        DiceRoller::without_delay()
    };

    let mut shell = Shell::new(chat, dice, rules);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    shell.print_banner(&mut stdout)?;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        if shell.handle_line(&line, &mut stdout).await? == Flow::Quit {
            break;
        }
        stdout.flush().ok();
    }

    Ok(())
}

/// Parse shell configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> ShellConfig {
    let mut config = ShellConfig {
        model: std::env::var("QHAUNTZ_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty()),
        rules_path: None,
        roll_delay: true,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--model" => {
                if let Some(model) = args.get(i + 1) {
                    config.model = Some(model.clone());
                    i += 1;
                }
            }
            "--rules" => {
                if let Some(path) = args.get(i + 1) {
                    config.rules_path = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--no-delay" => config.roll_delay = false,
            _ => {}
        }
        i += 1;
    }

    config
}

/// All per-session state behind the tabs.
pub struct Shell<S> {
    tab: Tab,
    editor: CharacterEditor,
    dice: DiceRoller,
    rules: RulesViewer,
    /// The chat, or why the GM tab is unavailable.
    chat: Result<ChatSession<S>, String>,
}

impl<S: TextSource> Shell<S> {
    pub fn new(chat: Result<ChatSession<S>, String>, dice: DiceRoller, rules: RulesViewer) -> Self {
        Self {
            tab: Tab::default(),
            editor: CharacterEditor::default(),
            dice,
            rules,
            chat,
        }
    }

    pub fn print_banner<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "=== Qhauntz ===")?;
        if let Err(reason) = &self.chat {
            writeln!(out, "GM assistant unavailable: {reason}")?;
        }
        writeln!(out)?;
        write_help(out)?;
        writeln!(out)?;
        writeln!(out, "[TAB] {}", self.tab)?;
        out.flush()
    }

    /// Handle one line of input.
    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        match commands::parse(line, self.tab) {
            Ok(None) => Ok(Flow::Continue),
            Ok(Some(command)) => self.execute(command, out).await,
            Err(e) => {
                writeln!(out, "[ERROR] {e}")?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        match command {
            Command::Quit => {
                writeln!(out, "Goodbye!")?;
                return Ok(Flow::Quit);
            }
            Command::Help => write_help(out)?,
            Command::SwitchTab(tab) => {
                self.tab = tab;
                writeln!(out, "[TAB] {tab}")?;
                self.show_tab(out)?;
            }
            Command::Character(command) => self.edit(command, out)?,
            Command::Roll => {
                writeln!(out, "[DICE] Rolling...")?;
                out.flush()?;
                let roll = self.dice.roll().await;
                writeln!(out, "[DICE] {roll}")?;
            }
            Command::Prompt(prompt) => self.ask(&prompt, out).await?,
            Command::Preset(index) => {
                if let Some(prompt) = PRESET_PROMPTS.get(index) {
                    writeln!(out, "[YOU] {prompt}")?;
                    self.ask(prompt, out).await?;
                }
            }
            Command::Search(term) => {
                self.rules.set_search(term);
                writeln!(out, "[RULES]")?;
                writeln!(out, "{}", self.rules.filtered())?;
            }
            Command::ClearSearch => {
                self.rules.set_search("");
                writeln!(out, "[RULES]")?;
                writeln!(out, "{}", self.rules.filtered())?;
            }
        }
        Ok(Flow::Continue)
    }

    fn show_tab<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self.tab {
            Tab::Character => write_sheet(&self.editor, out),
            Tab::Gm => match &self.chat {
                Ok(chat) if chat.messages().is_empty() => {
                    writeln!(out, "[GM] What story can I help you create today?")?;
                    for (i, prompt) in PRESET_PROMPTS.iter().enumerate() {
                        writeln!(out, "  preset {}: {prompt}", i + 1)?;
                    }
                    Ok(())
                }
                Ok(_) => Ok(()),
                Err(reason) => writeln!(out, "[ERROR] GM assistant unavailable: {reason}"),
            },
            Tab::Dice => match self.dice.last_roll() {
                Some(roll) => writeln!(out, "[DICE] Last roll: {roll}"),
                None => writeln!(out, "[DICE] Type roll to roll 4dF."),
            },
            Tab::Rules => {
                writeln!(out, "[RULES]")?;
                writeln!(out, "{}", self.rules.filtered())
            }
        }
    }

    fn edit<W: Write>(&mut self, command: CharacterCommand, out: &mut W) -> io::Result<()> {
        let result = match command {
            CharacterCommand::SetField(field, text) => {
                self.editor.set_field(field, text);
                Ok(())
            }
            CharacterCommand::SetStatus(status) => {
                self.editor.set_status(status);
                let description = status.description();
                writeln!(
                    out,
                    "[CHARACTER] {status} ({}): {}",
                    description.pronunciation, description.core
                )?;
                return Ok(());
            }
            CharacterCommand::SetAffinityName(name) => {
                self.editor.set_affinity_name(name);
                Ok(())
            }
            CharacterCommand::SetAffinity(slot, skill) => {
                self.editor.set_affinity_slot(slot, skill)
            }
            CharacterCommand::AssignPyramid {
                rating,
                slot,
                skill,
            } => self.editor.assign_pyramid_slot(rating, slot, skill),
            CharacterCommand::AddStunt => {
                let index = self.editor.add_stunt();
                writeln!(out, "[CHARACTER] Added stunt {}", index + 1)?;
                return Ok(());
            }
            CharacterCommand::SetStunt(index, text) => self.editor.set_stunt_text(index, text),
            CharacterCommand::RemoveStunt(index) => self.editor.remove_stunt(index).map(|_| ()),
            CharacterCommand::Show => return write_sheet(&self.editor, out),
            CharacterCommand::Json => {
                match serde_json::to_string_pretty(self.editor.character()) {
                    Ok(json) => writeln!(out, "{json}")?,
                    Err(e) => writeln!(out, "[ERROR] Could not serialize character: {e}")?,
                }
                return Ok(());
            }
        };

        match result {
            Ok(()) => writeln!(out, "[CHARACTER] Updated"),
            Err(e) => writeln!(out, "[ERROR] {e}"),
        }
    }

    async fn ask<W: Write>(&mut self, prompt: &str, out: &mut W) -> io::Result<()> {
        let chat = match &mut self.chat {
            Ok(chat) => chat,
            Err(reason) => return writeln!(out, "[ERROR] GM assistant unavailable: {reason}"),
        };

        let mut echoed = false;
        let outcome = chat
            .send_message_with(prompt, |event| match event {
                ChatEvent::Sent(_) => {}
                ChatEvent::ReplyStarted(_) => {
                    writeln!(out, "[GM]").ok();
                    echoed = true;
                }
                ChatEvent::Fragment { text, .. } => {
                    write!(out, "{text}").ok();
                    out.flush().ok();
                }
                ChatEvent::ReplyFinished(_) => {
                    writeln!(out).ok();
                }
                // Text already on screen is no longer in the transcript.
                ChatEvent::Failed(_) if echoed => {
                    writeln!(out).ok();
                    writeln!(out, "[GM] (reply discarded)").ok();
                }
                ChatEvent::Failed(_) => {}
            })
            .await;

        if let Err(e) = outcome {
            writeln!(out, "[ERROR] {e}")?;
        }
        Ok(())
    }
}

fn write_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  #tab <character|gm|dice|rules>  - Switch tab")?;
    writeln!(out, "  #help                           - Show this help")?;
    writeln!(out, "  #quit                           - Exit")?;
    writeln!(out, "Character tab:")?;
    writeln!(out, "  name|maxim|imperative|guild <text>")?;
    writeln!(out, "  status <name>")?;
    writeln!(out, "  affinity-name <text>")?;
    writeln!(out, "  affinity <attack|defend|tend|noncombat> <skill|none>")?;
    writeln!(out, "  pyramid <rating 1-4> <slot> <skill|none>")?;
    writeln!(out, "  stunt add | stunt set <n> <text> | stunt rm <n>")?;
    writeln!(out, "  show | json")?;
    writeln!(out, "Dice tab:   roll")?;
    writeln!(out, "GM tab:     <prompt> | preset <1-4>")?;
    writeln!(out, "Rules tab:  <search term> | clear")
}

fn write_sheet<W: Write>(editor: &CharacterEditor, out: &mut W) -> io::Result<()> {
    let character = editor.character();
    let derived = editor.derived();

    writeln!(out, "[CHARACTER]")?;
    for field in CharacterField::ALL {
        writeln!(out, "  {}: {}", field.label(), character.field(field))?;
    }

    let status = character.status.description();
    writeln!(
        out,
        "  Status: {} ({}) - {}",
        character.status, status.pronunciation, status.core
    )?;

    writeln!(out, "  Affinity: {}", character.affinity.name)?;
    for slot in AffinitySlot::ALL {
        let skill = character
            .affinity
            .slot(slot)
            .map(|s| s.name())
            .unwrap_or("-");
        writeln!(out, "    {}: {skill}", slot.name())?;
    }

    writeln!(out, "  Skills:")?;
    for tier in derived.pyramid {
        let mut slots: Vec<String> = stats::skills_at(&character.skills, tier.rating)
            .iter()
            .map(|s| s.to_string())
            .collect();
        slots.resize(slots.len().max(tier.capacity), "-".to_string());
        let warning = if tier.is_over_capacity() {
            " (over capacity)"
        } else {
            ""
        };
        writeln!(
            out,
            "    {} [{}/{}]: {}{warning}",
            tier.label(),
            tier.filled,
            tier.capacity,
            slots.join(", ")
        )?;
    }
    let mediocre: Vec<String> = stats::mediocre_skills(&character.skills)
        .iter()
        .map(|s| s.to_string())
        .collect();
    writeln!(out, "    Mediocre (+0): {}", mediocre.join(", "))?;

    writeln!(
        out,
        "  Skill points: {} (magical: {})",
        derived.skill_points, derived.magical_skill_points
    )?;
    let tracks: Vec<String> = derived.aether_tracks.iter().map(|t| t.to_string()).collect();
    let tracks = if tracks.is_empty() {
        "none".to_string()
    } else {
        tracks.join(" ")
    };
    writeln!(out, "  Aether tracks: {tracks}")?;
    writeln!(out, "  Endurance: {}", "[ ]".repeat(derived.endurance_boxes as usize))?;
    writeln!(out, "  Resolve: {}", "[ ]".repeat(derived.resolve_boxes as usize))?;

    writeln!(out, "  Stunts:")?;
    for (i, stunt) in character.stunts.iter().enumerate() {
        writeln!(out, "    {}. {stunt}", i + 1)?;
    }
    Ok(())
}
