//! Destructible floor layers

use crate::error::{ArenaError, Result};
use crate::host::World;
use crate::types::{Location, Material, TilePos};
use std::collections::HashSet;

/// One layer of breakable tiles.
///
/// Membership is fixed at construction. Whether a tile is currently broken
/// lives in the world, not here.
#[derive(Debug, Clone)]
pub struct Floor {
    tiles: Vec<TilePos>,
    index: HashSet<TilePos>,
    material: Material,
    elevation: i32,
}

impl Floor {
    /// Build a floor from its tiles. Duplicates are dropped, order is kept.
    pub fn new(tiles: impl IntoIterator<Item = TilePos>, material: Material) -> Result<Self> {
        let mut index = HashSet::new();
        let tiles: Vec<TilePos> = tiles.into_iter().filter(|t| index.insert(*t)).collect();

        let elevation = Self::elevation_of(&tiles).ok_or(ArenaError::EmptyFloor)?;

        Ok(Self {
            tiles,
            index,
            material,
            elevation,
        })
    }

    /// Height of the floor (its highest tile)
    pub fn elevation(&self) -> i32 {
        self.elevation
    }

    /// Elevation a floor built from `tiles` would have
    pub fn elevation_of(tiles: &[TilePos]) -> Option<i32> {
        tiles.iter().map(|t| t.y).max()
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn tiles(&self) -> &[TilePos] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.index.contains(&pos)
    }

    /// Break a tile as if it was mined. Returns false if the tile is not on this floor.
    pub fn break_tile(&self, pos: TilePos, world: &dyn World) -> bool {
        if !self.contains(pos) {
            return false;
        }
        world.set_tile_empty(pos);
        world.play_break_effect(pos, &self.material);
        true
    }

    /// Put every tile back to the floor material
    pub fn regenerate(&self, world: &dyn World) {
        for &tile in &self.tiles {
            world.restore_tile(tile, &self.material);
        }
    }

    /// Tiles evenly spread over the floor, one per player.
    ///
    /// Picks tile index `gap * i` for each player `i`, where
    /// `gap = tile_count / players`. Never returns more points than the floor
    /// has tiles, so the result is always duplicate free.
    pub fn spawn_tiles(&self, players: usize) -> Vec<TilePos> {
        let players = players.min(self.tiles.len());
        if players == 0 {
            return Vec::new();
        }

        let gap = self.tiles.len() / players;
        (0..players).map(|i| self.tiles[gap * i]).collect()
    }

    /// Standing positions above [`Floor::spawn_tiles`]
    pub fn generate_spawn_points(&self, players: usize) -> Vec<Location> {
        self.spawn_tiles(players).into_iter().map(Location::above).collect()
    }
}
