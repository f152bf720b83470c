use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::grid::{cluster_tiles, TileCoord};

use super::types::{Interactable, InteractableId, InteractableKind, RegistryError};

#[derive(Debug, Default)]
struct LevelEntry {
    next_id: u64,
    bounds: Option<(i32, i32)>,
    items: Vec<Interactable>,
}

impl LevelEntry {
    fn alloc_id(&mut self) -> InteractableId {
        let id = InteractableId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn check_bounds(&self, tiles: &[TileCoord]) -> Result<(), RegistryError> {
        let Some((width, height)) = self.bounds else {
            return Ok(());
        };
        for coord in tiles {
            if coord.x < 0 || coord.y < 0 || coord.x >= width || coord.y >= height {
                return Err(RegistryError::OutOfBounds {
                    x: coord.x,
                    y: coord.y,
                    width,
                    height,
                });
            }
        }
        Ok(())
    }

    /// Placement is atomic last-write-wins: any existing object owning
    /// one of the claimed tiles is removed entirely, including all its
    /// other tiles.
    fn evict_overlapping(&mut self, level: &str, tiles: &[TileCoord]) {
        self.items.retain(|item| {
            let overlaps = tiles.iter().any(|coord| item.owns_tile(*coord));
            if overlaps {
                debug!(
                    level,
                    evicted_id = item.id.0,
                    tile_count = item.tiles.len(),
                    "interactable_replaced_by_overlap"
                );
            }
            !overlaps
        });
    }

    fn insert(&mut self, level: &str, mut interactable: Interactable) {
        interactable.tiles.sort_by_key(|coord| coord.sort_key());
        interactable.tiles.dedup();
        self.evict_overlapping(level, &interactable.tiles);
        self.items.push(interactable);
    }
}

/// Owned store of every interactable per level. Lives with the session
/// or editor context that created it; levels are independent of each
/// other.
#[derive(Debug, Default)]
pub struct InteractableStore {
    levels: BTreeMap<String, LevelEntry>,
}

impl InteractableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level_bounds(&mut self, level: &str, width: i32, height: i32) {
        self.entry(level).bounds = Some((width, height));
    }

    /// Creates one object covering a single tile.
    pub fn place_single(
        &mut self,
        level: &str,
        coord: TileCoord,
        kind: InteractableKind,
        tile_visual_id: &str,
    ) -> Result<InteractableId, RegistryError> {
        self.place_explicit(level, &[coord], kind, tile_visual_id)
    }

    /// Editor flow: partitions the selection into adjacency-connected
    /// clusters and creates one object per cluster. Returns ids in
    /// cluster order.
    pub fn place_grouped(
        &mut self,
        level: &str,
        coords: &[TileCoord],
        kind: InteractableKind,
        tile_visual_id: &str,
    ) -> Result<Vec<InteractableId>, RegistryError> {
        if coords.is_empty() {
            return Err(RegistryError::EmptyTileSet);
        }
        let entry = self.entry(level);
        entry.check_bounds(coords)?;

        let clusters = cluster_tiles(coords);
        let mut ids = Vec::with_capacity(clusters.len());
        for tiles in clusters {
            let id = entry.alloc_id();
            entry.insert(
                level,
                Interactable {
                    id,
                    kind: kind.clone(),
                    tiles,
                    tile_visual_id: tile_visual_id.to_string(),
                    revealed: false,
                    pinned: false,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    /// Programmatic flow: the whole coordinate list becomes one logical
    /// object even when the tiles are not adjacency-connected. Distinct
    /// from `place_grouped`, which derives object boundaries from
    /// connectivity. Unlike the derived flow, where duplicate
    /// selections collapse, an explicit list naming the same tile twice
    /// is rejected as caller error.
    pub fn place_explicit(
        &mut self,
        level: &str,
        coords: &[TileCoord],
        kind: InteractableKind,
        tile_visual_id: &str,
    ) -> Result<InteractableId, RegistryError> {
        if coords.is_empty() {
            return Err(RegistryError::EmptyTileSet);
        }
        let mut seen: HashSet<TileCoord> = HashSet::with_capacity(coords.len());
        for coord in coords {
            if !seen.insert(*coord) {
                return Err(RegistryError::DuplicateTile {
                    x: coord.x,
                    y: coord.y,
                });
            }
        }
        let entry = self.entry(level);
        entry.check_bounds(coords)?;

        let id = entry.alloc_id();
        entry.insert(
            level,
            Interactable {
                id,
                kind,
                tiles: coords.to_vec(),
                tile_visual_id: tile_visual_id.to_string(),
                revealed: false,
                pinned: false,
            },
        );
        Ok(id)
    }

    /// Restores a persisted object, keeping its id. The id allocator is
    /// advanced past it so later placements never reuse the id.
    pub fn insert_loaded(&mut self, level: &str, interactable: Interactable) {
        let entry = self.entry(level);
        entry.next_id = entry.next_id.max(interactable.id.0.saturating_add(1));
        entry.insert(level, interactable);
    }

    /// Removes whichever object owns the given tile, returning it.
    pub fn remove_at(&mut self, level: &str, coord: TileCoord) -> Option<Interactable> {
        let entry = self.levels.get_mut(level)?;
        let index = entry.items.iter().position(|item| item.owns_tile(coord))?;
        Some(entry.items.remove(index))
    }

    pub fn interactable_at(&self, level: &str, coord: TileCoord) -> Option<&Interactable> {
        self.levels
            .get(level)?
            .items
            .iter()
            .find(|item| item.owns_tile(coord))
    }

    pub fn interactables(&self, level: &str) -> &[Interactable] {
        self.levels
            .get(level)
            .map(|entry| entry.items.as_slice())
            .unwrap_or(&[])
    }

    /// Clears the pinned flag on the object owning the tile, making an
    /// authored rule eligible for replacement on the next
    /// randomization pass. Returns false when no object owns the tile.
    pub fn unpin_at(&mut self, level: &str, coord: TileCoord) -> bool {
        let Some(entry) = self.levels.get_mut(level) else {
            return false;
        };
        match entry.items.iter_mut().find(|item| item.owns_tile(coord)) {
            Some(item) => {
                item.pinned = false;
                true
            }
            None => false,
        }
    }

    pub fn clear_level(&mut self, level: &str) {
        self.levels.remove(level);
    }

    pub fn level_names(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }

    pub(crate) fn items_mut(&mut self, level: &str) -> Option<&mut Vec<Interactable>> {
        self.levels.get_mut(level).map(|entry| &mut entry.items)
    }

    fn entry(&mut self, level: &str) -> &mut LevelEntry {
        self.levels.entry(level.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(pairs: &[(i32, i32)]) -> Vec<TileCoord> {
        pairs.iter().map(|&(x, y)| TileCoord::new(x, y)).collect()
    }

    #[test]
    fn place_grouped_splits_disconnected_selection_into_objects() {
        let mut store = InteractableStore::new();
        let ids = store
            .place_grouped(
                "level-2",
                &coords(&[(2, 2), (2, 3), (5, 5)]),
                InteractableKind::Empty,
                "11",
            )
            .expect("place");
        assert_eq!(ids.len(), 2);
        assert_eq!(store.interactables("level-2").len(), 2);
        let first = store
            .interactable_at("level-2", TileCoord::new(2, 3))
            .expect("owner");
        assert_eq!(first.tiles, coords(&[(2, 2), (2, 3)]));
    }

    #[test]
    fn place_explicit_keeps_disconnected_tiles_as_one_object() {
        let mut store = InteractableStore::new();
        let id = store
            .place_explicit(
                "level-3",
                &coords(&[(1, 1), (9, 9)]),
                InteractableKind::Note { rule: None },
                "4",
            )
            .expect("place");
        let at_far = store
            .interactable_at("level-3", TileCoord::new(9, 9))
            .expect("owner");
        assert_eq!(at_far.id, id);
        assert_eq!(at_far.tiles.len(), 2);
    }

    #[test]
    fn explicit_duplicate_tile_is_rejected_without_state_change() {
        let mut store = InteractableStore::new();
        let error = store
            .place_explicit(
                "level-1",
                &coords(&[(2, 2), (2, 2)]),
                InteractableKind::Empty,
                "0",
            )
            .expect_err("duplicate tile");
        assert_eq!(error, RegistryError::DuplicateTile { x: 2, y: 2 });
        assert!(store.interactables("level-1").is_empty());
    }

    #[test]
    fn grouped_duplicate_selections_still_collapse() {
        let mut store = InteractableStore::new();
        let ids = store
            .place_grouped(
                "level-1",
                &coords(&[(2, 2), (2, 2), (2, 3)]),
                InteractableKind::Empty,
                "0",
            )
            .expect("place");
        assert_eq!(ids.len(), 1);
        let item = store
            .interactable_at("level-1", TileCoord::new(2, 2))
            .expect("owner");
        assert_eq!(item.tiles, coords(&[(2, 2), (2, 3)]));
    }

    #[test]
    fn empty_selection_is_rejected_without_state_change() {
        let mut store = InteractableStore::new();
        let error = store
            .place_grouped("level-1", &[], InteractableKind::Empty, "0")
            .expect_err("empty");
        assert_eq!(error, RegistryError::EmptyTileSet);
        assert!(store.interactables("level-1").is_empty());
    }

    #[test]
    fn out_of_bounds_placement_is_rejected_when_bounds_known() {
        let mut store = InteractableStore::new();
        store.set_level_bounds("level-1", 32, 32);
        let error = store
            .place_single(
                "level-1",
                TileCoord::new(32, 5),
                InteractableKind::Empty,
                "0",
            )
            .expect_err("oob");
        assert!(matches!(error, RegistryError::OutOfBounds { x: 32, .. }));
    }

    #[test]
    fn overlap_removes_prior_object_entirely() {
        let mut store = InteractableStore::new();
        store
            .place_explicit(
                "level-2",
                &coords(&[(5, 5), (6, 5), (7, 5)]),
                InteractableKind::Note { rule: None },
                "7",
            )
            .expect("first");
        store
            .place_single("level-2", TileCoord::new(6, 5), InteractableKind::Empty, "8")
            .expect("second");

        // The prior object is gone from all of its tiles, not just the
        // contested one.
        assert!(store
            .interactable_at("level-2", TileCoord::new(5, 5))
            .is_none());
        assert!(store
            .interactable_at("level-2", TileCoord::new(7, 5))
            .is_none());
        let owner = store
            .interactable_at("level-2", TileCoord::new(6, 5))
            .expect("owner");
        assert_eq!(owner.kind, InteractableKind::Empty);
    }

    #[test]
    fn ids_are_never_reused_after_removal() {
        let mut store = InteractableStore::new();
        let first = store
            .place_single("level-1", TileCoord::new(1, 1), InteractableKind::Empty, "0")
            .expect("first");
        store.remove_at("level-1", TileCoord::new(1, 1)).expect("remove");
        let second = store
            .place_single("level-1", TileCoord::new(1, 1), InteractableKind::Empty, "0")
            .expect("second");
        assert!(second > first);
    }

    #[test]
    fn insert_loaded_preserves_id_and_advances_allocator() {
        let mut store = InteractableStore::new();
        store.insert_loaded(
            "level-4",
            Interactable {
                id: InteractableId(17),
                kind: InteractableKind::Door {
                    required_rule_count: 4,
                    open: false,
                },
                tiles: coords(&[(30, 10)]),
                tile_visual_id: "d1".to_string(),
                revealed: false,
                pinned: false,
            },
        );
        let fresh = store
            .place_single("level-4", TileCoord::new(0, 0), InteractableKind::Empty, "0")
            .expect("place");
        assert_eq!(fresh, InteractableId(18));
    }

    #[test]
    fn query_misses_return_none() {
        let store = InteractableStore::new();
        assert!(store
            .interactable_at("nowhere", TileCoord::new(0, 0))
            .is_none());
    }
}
