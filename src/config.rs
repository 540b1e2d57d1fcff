//! Saved arena layout

use crate::error::{ArenaError, Result};
use crate::floor::Floor;
use crate::types::{Location, Material, TilePos};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One floor as saved: its tiles and the material they regenerate to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorConfig {
    pub material: Material,
    pub tiles: Vec<TilePos>,
}

/// Everything needed to rebuild an arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub name: String,
    /// Highest floor first
    #[serde(default)]
    pub floors: Vec<FloorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectate: Option<Location>,
    pub elimination_height: i32,
}

impl ArenaConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Elevation of the lowest floor, measured the way [`Floor::elevation`] does
    pub fn lowest_floor_elevation(&self) -> Option<i32> {
        self.floors
            .iter()
            .filter_map(|f| Floor::elevation_of(&f.tiles))
            .min()
    }

    /// Reject layouts that cannot be played at all.
    ///
    /// An elimination height at or above the lowest floor only warns.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ArenaError::InvalidConfig("arena name is empty".to_string()));
        }

        for (i, floor) in self.floors.iter().enumerate() {
            if floor.tiles.is_empty() {
                return Err(ArenaError::InvalidConfig(format!(
                    "floor {} of arena {} has no tiles",
                    i, self.name
                )));
            }
        }

        if let Some(lowest) = self.lowest_floor_elevation() {
            if self.elimination_height >= lowest {
                warn!(
                    "Arena {} eliminates at y={}, which is not below its lowest floor at y={}",
                    self.name, self.elimination_height, lowest
                );
            }
        }

        Ok(())
    }
}
