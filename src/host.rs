//! Interfaces between the arena core and the game host.
//!
//! The host provides the world and player sessions; the arena only ever
//! fires calls at them and never waits on a result. The host's event
//! adapter drives the arena through [`GameEventHandler`].

use crate::types::{
    CountdownFrame, ItemDescriptor, Location, Material, Notification, PlayerId, TilePos,
    TitleTiming,
};
use std::sync::Arc;

/// Block mutation in the game world
pub trait World: Send + Sync {
    /// Replace the tile with empty space
    fn set_tile_empty(&self, pos: TilePos);

    /// Particles and sound of a tile of `material` breaking
    fn play_break_effect(&self, pos: TilePos, material: &Material);

    fn restore_tile(&self, pos: TilePos, material: &Material);
}

/// A connected player
pub trait PlayerSession: Send + Sync {
    fn teleport(&self, location: Location);

    fn send_notification(&self, notification: &Notification);

    fn send_title(&self, title: &Notification, subtitle: Option<&Notification>, timing: TitleTiming);

    fn grant_item(&self, item: &ItemDescriptor);

    /// Keep the current inventory so it can be handed back on leave
    fn snapshot_inventory(&self);

    fn restore_inventory(&self);

    fn show_countdown(&self, frame: &CountdownFrame);

    fn clear_countdown(&self);
}

/// Looks up live sessions. Offline players have none.
pub trait PlayerDirectory: Send + Sync {
    fn session(&self, player: PlayerId) -> Option<Arc<dyn PlayerSession>>;
}

/// What the host should do with a tile interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileInteraction {
    /// Not an arena player, leave the event alone
    Ignored,
    /// The arena broke the tile
    Broken,
    /// Cancel the change
    Blocked,
}

/// Entry points the host's event adapter calls
pub trait GameEventHandler {
    /// A player asked to join. Returns whether they were added
    fn handle_join_request(&mut self, player: PlayerId) -> bool;

    fn handle_leave(&mut self, player: PlayerId) -> bool;

    fn handle_tile_interact(&mut self, actor: PlayerId, pos: TilePos) -> TileInteraction;

    fn handle_player_move(&mut self, player: PlayerId, location: Location);
}
