use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::TileCoord;
use crate::interactables::{Interactable, InteractableId, InteractableKind, InteractableStore};

use super::atomic_io::write_text_atomic;

pub const INTERACTABLES_LAYER: &str = "interactables";

const TYPE_EMPTY: &str = "empty";
const TYPE_NOTE: &str = "note";
const TYPE_NPC: &str = "npc";
const TYPE_MULTI_NPC: &str = "multi_npc";
const TYPE_DOOR: &str = "door";
const DEFAULT_DOOR_RULES: u32 = 4;

#[derive(Debug, Error)]
pub enum LevelFileError {
    #[error("failed to read level file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse level file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode level file {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("failed to write level file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One row of the interactables layer. Multi-tile objects repeat `id`
/// and `type` across their tile records; the anchor record additionally
/// carries the full coordinate list and the payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TileRecord {
    id: u64,
    x: i32,
    y: i32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    npc_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinates: Option<Vec<[i32; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requires_rules: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tile_visual: Option<String>,
}

/// A level file held as a generic JSON tree. Only the interactables
/// layer is interpreted; every other layer and top-level key passes
/// through reads and writes verbatim.
#[derive(Debug, Clone)]
pub struct LevelDocument {
    path: PathBuf,
    root: Value,
}

pub fn read_level(path: &Path) -> Result<LevelDocument, LevelFileError> {
    LevelDocument::read(path)
}

pub fn write_level(
    document: &mut LevelDocument,
    store: &InteractableStore,
    level: &str,
) -> Result<(), LevelFileError> {
    document.replace_interactables_layer(store, level);
    document.save()
}

impl LevelDocument {
    pub fn read(path: &Path) -> Result<Self, LevelFileError> {
        let raw = fs::read_to_string(path).map_err(|source| LevelFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root: Value =
            serde_json::from_str(&raw).map_err(|error| LevelFileError::Parse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    /// A fresh document with no layers, for levels that do not exist on
    /// disk yet.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            root: json!({ "layers": [] }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-level randomization target from `metadata.rule_count`.
    pub fn rule_count(&self) -> Option<usize> {
        self.root
            .get("metadata")?
            .get("rule_count")?
            .as_u64()
            .map(|count| count as usize)
    }

    pub fn map_bounds(&self) -> Option<(i32, i32)> {
        let width = self.root.get("mapWidth")?.as_i64()?;
        let height = self.root.get("mapHeight")?.as_i64()?;
        if width <= 0 || height <= 0 {
            return None;
        }
        Some((width as i32, height as i32))
    }

    /// Loads the interactables layer into the store under `level`,
    /// returning how many objects were restored. Malformed tile records
    /// are skipped with a warning; the rest of the layer still loads. A
    /// record carrying a `rule` loads pinned, excluded from later
    /// randomization.
    pub fn load_interactables(&self, store: &mut InteractableStore, level: &str) -> usize {
        if let Some((width, height)) = self.map_bounds() {
            store.set_level_bounds(level, width, height);
        }

        let Some(tiles) = self.interactables_layer().and_then(|layer| {
            layer.get("tiles").and_then(Value::as_array)
        }) else {
            debug!(level, path = %self.path.display(), "level_has_no_interactables_layer");
            return 0;
        };

        // Records sharing an id describe one multi-tile object.
        let mut records_by_id: Vec<(u64, Vec<TileRecord>)> = Vec::new();
        for (index, tile_value) in tiles.iter().enumerate() {
            let record = match serde_json::from_value::<TileRecord>(tile_value.clone()) {
                Ok(record) => record,
                Err(error) => {
                    warn!(
                        level,
                        record_index = index,
                        error = %error,
                        "level_tile_record_skipped_malformed"
                    );
                    continue;
                }
            };
            match records_by_id.iter_mut().find(|(id, _)| *id == record.id) {
                Some((_, group)) => group.push(record),
                None => records_by_id.push((record.id, vec![record])),
            }
        }

        let mut loaded = 0;
        for (id, records) in records_by_id {
            match interactable_from_records(id, &records) {
                Some(interactable) => {
                    store.insert_loaded(level, interactable);
                    loaded += 1;
                }
                None => {
                    warn!(
                        level,
                        object_id = id,
                        kind = %records[0].kind,
                        "level_tile_record_skipped_unknown_type"
                    );
                }
            }
        }
        loaded
    }

    /// Rebuilds the interactables layer node from the store, leaving
    /// every sibling layer and key untouched. An existing layer keeps
    /// its `collider` flag and any extra keys; a missing layer is
    /// appended with `collider: false`.
    fn replace_interactables_layer(&mut self, store: &InteractableStore, level: &str) {
        let tiles = Value::Array(
            store
                .interactables(level)
                .iter()
                .flat_map(tile_records_for)
                .map(|record| serde_json::to_value(record).unwrap_or(Value::Null))
                .collect(),
        );

        let root = match &mut self.root {
            Value::Object(map) => map,
            other => {
                *other = Value::Object(Map::new());
                match other {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                }
            }
        };
        if !matches!(root.get("layers"), Some(Value::Array(_))) {
            root.insert("layers".to_string(), Value::Array(Vec::new()));
        }
        let Some(Value::Array(layers)) = root.get_mut("layers") else {
            return;
        };

        for layer in layers.iter_mut() {
            if layer.get("name").and_then(Value::as_str) == Some(INTERACTABLES_LAYER) {
                layer["tiles"] = tiles;
                return;
            }
        }

        let mut layer = Map::new();
        layer.insert("name".to_string(), Value::String(INTERACTABLES_LAYER.to_string()));
        layer.insert("tiles".to_string(), tiles);
        layer.insert("collider".to_string(), Value::Bool(false));
        layers.push(Value::Object(layer));
    }

    /// Atomic write: the file is replaced whole or not at all, so an
    /// interrupted save never leaves a truncated level on disk.
    fn save(&self) -> Result<(), LevelFileError> {
        let text = serde_json::to_string_pretty(&self.root).map_err(|error| {
            LevelFileError::Encode {
                path: self.path.clone(),
                message: error.to_string(),
            }
        })?;
        write_text_atomic(&self.path, &text).map_err(|source| LevelFileError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn interactables_layer(&self) -> Option<&Value> {
        self.root
            .get("layers")?
            .as_array()?
            .iter()
            .find(|layer| layer.get("name").and_then(Value::as_str) == Some(INTERACTABLES_LAYER))
    }
}

fn interactable_from_records(id: u64, records: &[TileRecord]) -> Option<Interactable> {
    let anchor = &records[0];

    let mut tiles: Vec<TileCoord> = Vec::new();
    for record in records {
        tiles.push(TileCoord::new(record.x, record.y));
        if let Some(extra) = &record.coordinates {
            tiles.extend(extra.iter().map(|&[x, y]| TileCoord::new(x, y)));
        }
    }
    tiles.sort_by_key(|coord| coord.sort_key());
    tiles.dedup();

    let rule = records.iter().find_map(|record| record.rule.clone());
    let npc_name = records.iter().find_map(|record| record.npc_name.clone());
    let tile_visual_id = records
        .iter()
        .find_map(|record| record.tile_visual.clone())
        .unwrap_or_default();

    let kind = match anchor.kind.as_str() {
        TYPE_EMPTY => InteractableKind::Empty,
        TYPE_NOTE => InteractableKind::Note { rule: rule.clone() },
        TYPE_NPC | TYPE_MULTI_NPC => InteractableKind::Npc {
            name: npc_name,
            rule: rule.clone(),
        },
        TYPE_DOOR => InteractableKind::Door {
            required_rule_count: records
                .iter()
                .find_map(|record| record.requires_rules)
                .unwrap_or(DEFAULT_DOOR_RULES),
            open: false,
        },
        _ => return None,
    };

    let pinned = !kind.is_door() && rule.is_some();
    Some(Interactable {
        id: InteractableId(id),
        kind,
        tiles,
        tile_visual_id,
        revealed: false,
        pinned,
    })
}

fn tile_records_for(item: &Interactable) -> Vec<TileRecord> {
    let multi = item.tiles.len() > 1;
    let kind_token = match &item.kind {
        InteractableKind::Empty => TYPE_EMPTY,
        InteractableKind::Note { .. } => TYPE_NOTE,
        InteractableKind::Npc { .. } if multi => TYPE_MULTI_NPC,
        InteractableKind::Npc { .. } => TYPE_NPC,
        InteractableKind::Door { .. } => TYPE_DOOR,
    };
    let anchor = item.anchor_tile();

    item.tiles
        .iter()
        .map(|&coord| {
            let is_anchor = coord == anchor;
            let mut record = TileRecord {
                id: item.id.0,
                x: coord.x,
                y: coord.y,
                kind: kind_token.to_string(),
                rule: None,
                npc_name: None,
                coordinates: None,
                requires_rules: None,
                tile_visual: None,
            };
            if is_anchor {
                record.rule = item.kind.rule().map(ToString::to_string);
                if let InteractableKind::Npc { name, .. } = &item.kind {
                    record.npc_name = name.clone();
                }
                if let InteractableKind::Door {
                    required_rule_count, ..
                } = item.kind
                {
                    record.requires_rules = Some(required_rule_count);
                }
                if multi {
                    record.coordinates =
                        Some(item.tiles.iter().map(|tile| [tile.x, tile.y]).collect());
                }
                if !item.tile_visual_id.is_empty() {
                    record.tile_visual = Some(item.tile_visual_id.clone());
                }
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn level_json() -> Value {
        json!({
            "tileSize": 16,
            "mapWidth": 40,
            "mapHeight": 30,
            "metadata": { "description": "quiet halls", "rule_count": 5 },
            "layers": [
                {
                    "name": "ground",
                    "tiles": [ { "id": "12", "x": 0, "y": 0 } ],
                    "collider": false
                },
                {
                    "name": "walls",
                    "tiles": [ { "id": "33", "x": 1, "y": 0 } ],
                    "collider": true
                },
                {
                    "name": "interactables",
                    "tiles": [
                        { "id": 0, "x": 10, "y": 5, "type": "note",
                          "rule": "Password must contain at least one number" },
                        { "id": 1, "x": 15, "y": 8, "type": "empty" },
                        { "id": 2, "x": 5, "y": 5, "type": "multi_npc",
                          "npc_name": "Old Griff",
                          "coordinates": [[5, 5], [6, 5], [7, 5]] },
                        { "id": 2, "x": 6, "y": 5, "type": "multi_npc" },
                        { "id": 2, "x": 7, "y": 5, "type": "multi_npc" },
                        { "id": 3, "x": 30, "y": 10, "type": "door", "requires_rules": 4 }
                    ],
                    "collider": true
                }
            ]
        })
    }

    fn write_fixture(dir: &TempDir, value: &Value) -> PathBuf {
        let path = dir.path().join("level-2.json");
        fs::write(&path, serde_json::to_string_pretty(value).expect("encode")).expect("write");
        path
    }

    #[test]
    fn loads_records_into_registry_with_pinning() {
        let dir = TempDir::new().expect("temp");
        let path = write_fixture(&dir, &level_json());
        let document = LevelDocument::read(&path).expect("read");
        assert_eq!(document.rule_count(), Some(5));
        assert_eq!(document.map_bounds(), Some((40, 30)));

        let mut store = InteractableStore::new();
        let loaded = document.load_interactables(&mut store, "level-2");
        assert_eq!(loaded, 4);

        let note = store
            .interactable_at("level-2", TileCoord::new(10, 5))
            .expect("note");
        assert!(note.pinned, "authored rule must load pinned");
        assert_eq!(
            note.kind.rule(),
            Some("Password must contain at least one number")
        );

        let empty = store
            .interactable_at("level-2", TileCoord::new(15, 8))
            .expect("empty");
        assert_eq!(empty.kind, InteractableKind::Empty);
        assert!(!empty.pinned);

        let npc = store
            .interactable_at("level-2", TileCoord::new(7, 5))
            .expect("npc spans all listed tiles");
        assert_eq!(npc.tiles.len(), 3);
        assert!(matches!(
            &npc.kind,
            InteractableKind::Npc { name: Some(name), rule: None } if name == "Old Griff"
        ));

        let door = store
            .interactable_at("level-2", TileCoord::new(30, 10))
            .expect("door");
        assert_eq!(
            door.kind,
            InteractableKind::Door {
                required_rule_count: 4,
                open: false
            }
        );
    }

    #[test]
    fn malformed_records_are_skipped_and_the_rest_load() {
        let dir = TempDir::new().expect("temp");
        let mut value = level_json();
        let tiles = value["layers"][2]["tiles"].as_array_mut().expect("tiles");
        tiles.push(json!({ "id": 9, "x": 1, "y": 1, "type": "teleporter" }));
        tiles.push(json!({ "x": 2, "y": 2, "type": "note" }));
        let path = write_fixture(&dir, &value);

        let mut store = InteractableStore::new();
        let loaded = LevelDocument::read(&path)
            .expect("read")
            .load_interactables(&mut store, "level-2");
        assert_eq!(loaded, 4, "only well-formed known records load");
    }

    #[test]
    fn round_trip_reproduces_equivalent_registry() {
        let dir = TempDir::new().expect("temp");
        let path = dir.path().join("fresh.json");

        let mut store = InteractableStore::new();
        store
            .place_single(
                "fresh",
                TileCoord::new(3, 3),
                InteractableKind::Note {
                    rule: Some("Password must not contain dictionary words".to_string()),
                },
                "5",
            )
            .expect("note");
        store
            .place_explicit(
                "fresh",
                &[TileCoord::new(8, 2), TileCoord::new(9, 2)],
                InteractableKind::Npc {
                    name: Some("Keeper Odile".to_string()),
                    rule: None,
                },
                "21",
            )
            .expect("npc");
        store
            .place_single(
                "fresh",
                TileCoord::new(12, 12),
                InteractableKind::Door {
                    required_rule_count: 6,
                    open: false,
                },
                "40",
            )
            .expect("door");

        let mut document = LevelDocument::empty(&path);
        write_level(&mut document, &store, "fresh").expect("write");

        let mut reloaded = InteractableStore::new();
        LevelDocument::read(&path)
            .expect("read back")
            .load_interactables(&mut reloaded, "fresh");

        let originals: Vec<_> = store
            .interactables("fresh")
            .iter()
            .map(|item| (item.id, item.kind.clone(), item.tiles.clone(), item.tile_visual_id.clone()))
            .collect();
        let restored: Vec<_> = reloaded
            .interactables("fresh")
            .iter()
            .map(|item| (item.id, item.kind.clone(), item.tiles.clone(), item.tile_visual_id.clone()))
            .collect();
        assert_eq!(originals, restored);
    }

    #[test]
    fn sibling_layers_pass_through_writes_untouched() {
        let dir = TempDir::new().expect("temp");
        let path = write_fixture(&dir, &level_json());

        let document = LevelDocument::read(&path).expect("read");
        let mut store = InteractableStore::new();
        document.load_interactables(&mut store, "level-2");
        let mut document = document;
        write_level(&mut document, &store, "level-2").expect("write");

        let rewritten: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read back")).expect("parse");
        let original = level_json();
        assert_eq!(rewritten["layers"][0], original["layers"][0]);
        assert_eq!(rewritten["layers"][1], original["layers"][1]);
        assert_eq!(rewritten["metadata"], original["metadata"]);
        assert_eq!(rewritten["tileSize"], original["tileSize"]);
        // The interactables layer keeps its collider flag.
        assert_eq!(rewritten["layers"][2]["collider"], Value::Bool(true));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = TempDir::new().expect("temp");
        let error =
            LevelDocument::read(&dir.path().join("absent.json")).expect_err("missing file");
        assert!(matches!(error, LevelFileError::Read { .. }));
    }

    #[test]
    fn multi_tile_anchor_carries_coordinates_list() {
        let dir = TempDir::new().expect("temp");
        let path = dir.path().join("multi.json");
        let mut store = InteractableStore::new();
        store
            .place_explicit(
                "multi",
                &[TileCoord::new(2, 1), TileCoord::new(2, 2), TileCoord::new(3, 2)],
                InteractableKind::Npc {
                    name: Some("Porter Sy".to_string()),
                    rule: None,
                },
                "2",
            )
            .expect("npc");

        let mut document = LevelDocument::empty(&path);
        write_level(&mut document, &store, "multi").expect("write");

        let value: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        let tiles = value["layers"][0]["tiles"].as_array().expect("tiles");
        assert_eq!(tiles.len(), 3);
        let anchors: Vec<_> = tiles
            .iter()
            .filter(|tile| tile.get("coordinates").is_some())
            .collect();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0]["type"], "multi_npc");
        assert_eq!(
            anchors[0]["coordinates"],
            json!([[2, 1], [2, 2], [3, 2]])
        );
        for tile in tiles {
            assert_eq!(tile["id"], 0);
        }
    }
}
