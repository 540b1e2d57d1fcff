//! # spleef-arena
//!
//! Game core for a last-player-standing spleef arena. Players stand on
//! breakable floors and are out once they fall below the elimination height.
//!
//! ## Features
//!
//! - **State machine**: disabled, waiting, starting, playing, ended
//! - **Floors**: tile membership, breaking, regeneration and spawn points
//! - **Countdown**: a shared progress display with a single cancellable ticker
//! - **Host interfaces**: world, player sessions and scheduling are injected
//! - **Runtime**: one tokio task per arena drains commands and timers in order
//!
//! ## Example
//!
//! ```rust,ignore
//! use spleef_arena::{ArenaConfig, ArenaSettings, spawn_arena};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArenaConfig::load("arenas/classic.json")?;
//!     let settings = ArenaSettings::default().auto_start_players(4);
//!
//!     let (arena, mut events) = spawn_arena(config, settings, world, players)?;
//!     arena.enable().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     arena.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod config;
pub mod countdown;
pub mod error;
pub mod floor;
pub mod host;
pub mod runtime;
pub mod scheduler;
pub mod time;
pub mod types;

#[cfg(test)]
mod testing;

pub use arena::{Arena, ArenaEvent, ArenaServices};
pub use config::{ArenaConfig, FloorConfig};
pub use countdown::Countdown;
pub use error::{ArenaError, Result};
pub use floor::Floor;
pub use host::{GameEventHandler, PlayerDirectory, PlayerSession, TileInteraction, World};
pub use runtime::{ArenaCommand, ArenaHandle, spawn_arena};
pub use scheduler::{ManualScheduler, ScheduledTask, Scheduler, TaskHandle, TokioScheduler};
pub use time::{Clock, ManualClock, SystemClock, TokioClock};
pub use types::*;
