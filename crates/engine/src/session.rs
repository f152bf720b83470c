use std::collections::BTreeSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::grid::TileCoord;
use crate::interactables::{assign_rules, InteractableKind, InteractableStore, RuleCatalog};
use crate::levels::LevelDocument;

/// Fallback randomization target for levels whose metadata does not
/// carry `rule_count`.
pub const DEFAULT_RULE_COUNT: usize = 4;

const ALREADY_TOLD_MESSAGE: &str = "You already got everything from this one.";

const NOTHING_HERE_LINES: &[&str] = &[
    "Nothing here. Just dust.",
    "You search around but find nothing.",
    "Empty. Someone must have gotten here first.",
    "There is nothing of interest here.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// No interactable owns the tile.
    Nothing,
    RuleFound { text: String },
    NothingHere { flavor: &'static str },
    AlreadyTold,
    DoorLocked { collected: usize, required: u32 },
    DoorOpened,
    DoorAlreadyOpen,
}

impl InteractionOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Nothing => "There is nothing to interact with here.".to_string(),
            Self::RuleFound { text } => format!("You found a rule: {text}"),
            Self::NothingHere { flavor } => (*flavor).to_string(),
            Self::AlreadyTold => ALREADY_TOLD_MESSAGE.to_string(),
            Self::DoorLocked {
                collected,
                required,
            } => format!("The door is locked. You have {collected}/{required} rules."),
            Self::DoorOpened => "The door unlocks and swings open.".to_string(),
            Self::DoorAlreadyOpen => "The door is already open. You can pass through.".to_string(),
        }
    }
}

/// Live interactable set for one loaded level plus the player's distinct
/// collected rules. Editor mutation and gameplay interaction never run
/// concurrently, so the session owns its store outright.
pub struct LevelSession {
    level: String,
    store: InteractableStore,
    collected: BTreeSet<String>,
    rng: StdRng,
}

impl LevelSession {
    /// Loads the level file, restores its interactables, and randomizes
    /// rules over the unpinned candidates. The randomization target is
    /// `rule_count_override` when given, otherwise the level's
    /// `metadata.rule_count`, otherwise [`DEFAULT_RULE_COUNT`]. Per the
    /// engine's no-fatal-errors policy an unreadable file yields an
    /// empty session and a failed randomization leaves rules
    /// unassigned; both are logged.
    pub fn load(
        path: &Path,
        level: &str,
        catalog: &RuleCatalog,
        mut rng: StdRng,
        rule_count_override: Option<usize>,
    ) -> Self {
        let mut store = InteractableStore::new();
        let mut rule_count = rule_count_override.unwrap_or(DEFAULT_RULE_COUNT);

        match LevelDocument::read(path) {
            Ok(document) => {
                rule_count = rule_count_override
                    .or_else(|| document.rule_count())
                    .unwrap_or(DEFAULT_RULE_COUNT);
                let loaded = document.load_interactables(&mut store, level);
                info!(level, loaded, rule_count, "level_session_loaded");
            }
            Err(error) => {
                warn!(level, error = %error, "level_file_unavailable_starting_empty");
            }
        }

        if let Err(error) = assign_rules(&mut store, level, rule_count, catalog, &mut rng) {
            warn!(level, error = %error, "level_rule_randomization_skipped");
        }

        Self::from_store(level, store, rng)
    }

    /// Wraps an already-populated store, leaving rule assignment as-is.
    pub fn from_store(level: &str, store: InteractableStore, rng: StdRng) -> Self {
        Self {
            level: level.to_string(),
            store,
            collected: BTreeSet::new(),
            rng,
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn store(&self) -> &InteractableStore {
        &self.store
    }

    /// Distinct rules collected so far; the same rule text collected
    /// twice counts once.
    pub fn collected_rule_count(&self) -> usize {
        self.collected.len()
    }

    pub fn collected_rules(&self) -> impl Iterator<Item = &str> {
        self.collected.iter().map(String::as_str)
    }

    pub fn interact(&mut self, coord: TileCoord) -> InteractionOutcome {
        let Some(items) = self.store.items_mut(&self.level) else {
            return InteractionOutcome::Nothing;
        };
        let Some(item) = items.iter_mut().find(|item| item.owns_tile(coord)) else {
            return InteractionOutcome::Nothing;
        };

        match &mut item.kind {
            InteractableKind::Door {
                required_rule_count,
                open,
            } => {
                if *open {
                    return InteractionOutcome::DoorAlreadyOpen;
                }
                let required = *required_rule_count;
                if self.collected.len() >= required as usize {
                    // Monotonic: a door never relocks within a session.
                    *open = true;
                    info!(level = %self.level, object_id = item.id.0, "door_opened");
                    InteractionOutcome::DoorOpened
                } else {
                    InteractionOutcome::DoorLocked {
                        collected: self.collected.len(),
                        required,
                    }
                }
            }
            InteractableKind::Empty
            | InteractableKind::Note { .. }
            | InteractableKind::Npc { .. } => {
                if item.revealed {
                    return InteractionOutcome::AlreadyTold;
                }
                item.revealed = true;
                match item.kind.rule() {
                    Some(text) => {
                        let text = text.to_string();
                        self.collected.insert(text.clone());
                        info!(
                            level = %self.level,
                            object_id = item.id.0,
                            collected = self.collected.len(),
                            "rule_collected"
                        );
                        InteractionOutcome::RuleFound { text }
                    }
                    None => InteractionOutcome::NothingHere {
                        flavor: NOTHING_HERE_LINES
                            .choose(&mut self.rng)
                            .copied()
                            .unwrap_or(NOTHING_HERE_LINES[0]),
                    },
                }
            }
        }
    }
}
