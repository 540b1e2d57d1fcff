//! Error types for spleef-arena

use crate::types::GameState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Cannot {action} while the arena is {state}")]
    InvalidState {
        action: &'static str,
        state: GameState,
    },

    #[error("Arena has no floors")]
    NoFloors,

    #[error("Not enough players: need {required}, have {present}")]
    NotEnoughPlayers { required: usize, present: usize },

    #[error("Top floor has {tiles} tiles, not enough for {players} players")]
    NotEnoughTiles { tiles: usize, players: usize },

    #[error("Floor has no tiles")]
    EmptyFloor,

    #[error("No floor at index {0}")]
    FloorNotFound(usize),

    #[error("Arena has no {0} location set")]
    MissingLocation(&'static str),

    #[error("Invalid arena config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arena task has stopped")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ArenaError>;
