use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Side length of one grid cell in pixels. The level grid addresses
/// 16x16 cells with the origin at the top-left corner.
pub const GRID_CELL_PX: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Reading order: top-to-bottom, then left-to-right. Used everywhere
    /// a stable ordering of tiles is needed.
    pub fn sort_key(self) -> (i32, i32) {
        (self.y, self.x)
    }

    fn neighbors4(self) -> [TileCoord; 4] {
        [
            TileCoord::new(self.x - 1, self.y),
            TileCoord::new(self.x + 1, self.y),
            TileCoord::new(self.x, self.y - 1),
            TileCoord::new(self.x, self.y + 1),
        ]
    }
}

/// Partitions a tile selection into maximal 4-directionally connected
/// clusters. Duplicate coordinates collapse to one. The result is
/// deterministic for a given input: clusters are ordered by their
/// minimum member in reading order, and members within a cluster are
/// sorted the same way.
pub fn cluster_tiles(coords: &[TileCoord]) -> Vec<Vec<TileCoord>> {
    let unique: HashSet<TileCoord> = coords.iter().copied().collect();
    let mut seeds: Vec<TileCoord> = unique.iter().copied().collect();
    seeds.sort_by_key(|coord| coord.sort_key());

    let mut visited: HashSet<TileCoord> = HashSet::with_capacity(unique.len());
    let mut clusters = Vec::new();

    for seed in seeds {
        if visited.contains(&seed) {
            continue;
        }
        let mut cluster = Vec::new();
        let mut stack = vec![seed];
        visited.insert(seed);
        while let Some(coord) = stack.pop() {
            cluster.push(coord);
            for neighbor in coord.neighbors4() {
                if unique.contains(&neighbor) && visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        cluster.sort_by_key(|coord| coord.sort_key());
        clusters.push(cluster);
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(pairs: &[(i32, i32)]) -> Vec<TileCoord> {
        pairs.iter().map(|&(x, y)| TileCoord::new(x, y)).collect()
    }

    #[test]
    fn adjacent_pair_and_isolated_tile_form_two_clusters() {
        let clusters = cluster_tiles(&coords(&[(2, 2), (2, 3), (5, 5)]));
        assert_eq!(
            clusters,
            vec![coords(&[(2, 2), (2, 3)]), coords(&[(5, 5)])]
        );
    }

    #[test]
    fn partition_union_equals_input_and_clusters_are_disjoint() {
        let input = coords(&[(0, 0), (1, 0), (4, 4), (4, 5), (5, 5), (9, 0), (0, 1)]);
        let clusters = cluster_tiles(&input);

        let mut seen: HashSet<TileCoord> = HashSet::new();
        for cluster in &clusters {
            assert!(!cluster.is_empty());
            for coord in cluster {
                assert!(seen.insert(*coord), "tile appears in two clusters");
            }
        }
        let expected: HashSet<TileCoord> = input.into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn diagonal_tiles_do_not_connect() {
        let clusters = cluster_tiles(&coords(&[(3, 3), (4, 4)]));
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn duplicates_collapse_to_one() {
        let clusters = cluster_tiles(&coords(&[(7, 7), (7, 7), (7, 8)]));
        assert_eq!(clusters, vec![coords(&[(7, 7), (7, 8)])]);
    }

    #[test]
    fn l_shaped_selection_is_one_cluster() {
        let input = coords(&[(15, 10), (15, 11), (15, 12), (16, 12), (17, 12)]);
        let clusters = cluster_tiles(&input);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn grouping_is_deterministic_regardless_of_input_order() {
        let forward = coords(&[(1, 1), (2, 1), (8, 8), (8, 9)]);
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(cluster_tiles(&forward), cluster_tiles(&reversed));
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_tiles(&[]).is_empty());
    }
}
