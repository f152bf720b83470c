use thiserror::Error;

use crate::grid::TileCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InteractableId(pub u64);

/// The four object kinds the engine manages. Each variant carries only
/// the fields valid for that kind; behavior that branches on kind
/// matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractableKind {
    Empty,
    Note { rule: Option<String> },
    Npc { name: Option<String>, rule: Option<String> },
    Door { required_rule_count: u32, open: bool },
}

impl InteractableKind {
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Note { rule } | Self::Npc { rule, .. } => rule.as_deref(),
            Self::Empty | Self::Door { .. } => None,
        }
    }

    /// Candidates for rule randomization: empty slots, notes, and NPCs.
    /// Doors never receive a rule payload.
    pub fn is_rule_candidate(&self) -> bool {
        matches!(self, Self::Empty | Self::Note { .. } | Self::Npc { .. })
    }

    pub fn is_door(&self) -> bool {
        matches!(self, Self::Door { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interactable {
    pub id: InteractableId,
    pub kind: InteractableKind,
    /// Non-empty, sorted in reading order. Tiles of one object never
    /// overlap tiles of another object in the same level.
    pub tiles: Vec<TileCoord>,
    /// Opaque tileset reference for the rendering collaborator.
    pub tile_visual_id: String,
    /// Session-scoped: whether the player has already received this
    /// object's message. Doors track open state in their variant.
    pub revealed: bool,
    /// True when the rule came from the level file rather than the
    /// randomizer; pinned objects are excluded from re-randomization.
    pub pinned: bool,
}

impl Interactable {
    pub fn owns_tile(&self, coord: TileCoord) -> bool {
        self.tiles.contains(&coord)
    }

    /// The anchor tile is the minimum member in reading order. Multi-tile
    /// serialization hangs the coordinate list off this record.
    pub fn anchor_tile(&self) -> TileCoord {
        self.tiles[0]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an interactable requires at least one tile")]
    EmptyTileSet,
    #[error("explicit coordinate list claims tile ({x}, {y}) twice")]
    DuplicateTile { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is outside the {width}x{height} level grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}
