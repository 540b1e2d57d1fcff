//! Type definitions for spleef-arena

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Message template keys the arena sends to players.
///
/// Resolving a key to display text is left to the host.
pub mod messages {
    pub const LOBBY_JOIN: &str = "Lobby.Join";
    pub const SPECTATE_IN_PROGRESS: &str = "Spectate.GameInProgress";
    pub const GAME_BEGIN: &str = "Game.Begin";
    pub const GAME_ELIMINATED: &str = "Game.Eliminated";
    pub const GAME_WIN: &str = "Game.Win";
    pub const GAME_END: &str = "Game.End";
}

/// Lifecycle state of an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    /// Not joinable. New, unconfigured arenas start here
    #[default]
    Disabled,
    /// Joinable, players gather in the lobby
    Waiting,
    /// Players are on the floor but cannot break tiles yet
    Starting,
    /// Round in progress, late joiners spectate
    Playing,
    /// Round over, the winner gets a moment before the arena resets
    Ended,
}

impl GameState {
    pub fn is_joinable(self) -> bool {
        self != GameState::Disabled
    }

    /// Floor tiles may only be broken while playing
    pub fn allows_tile_break(self) -> bool {
        self == GameState::Playing
    }

    /// A round is underway (players are on the floor)
    pub fn in_round(self) -> bool {
        matches!(self, GameState::Starting | GameState::Playing)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::Disabled => "disabled",
            GameState::Waiting => "waiting",
            GameState::Starting => "starting",
            GameState::Playing => "playing",
            GameState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Identifies a connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Block position of a floor tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A point in the world players can be teleported to
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Standing position on top of a tile
    pub fn above(tile: TilePos) -> Self {
        Self {
            x: f64::from(tile.x),
            y: f64::from(tile.y) + 1.0,
            z: f64::from(tile.z),
        }
    }
}

/// Material tag a floor regenerates to (e.g. "snow_block")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(String);

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An item handed to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub material: Material,
    pub name: String,
    #[serde(default)]
    pub lore: Vec<String>,
}

impl ItemDescriptor {
    /// The shovel every player gets at the start of a round
    pub fn starting_shovel() -> Self {
        Self {
            material: Material::new("iron_shovel"),
            name: "The Shovel of Destiny".to_string(),
            lore: vec![
                "This shovel will bring you:".to_string(),
                "Fun".to_string(),
                "Pain".to_string(),
                "Falling".to_string(),
            ],
        }
    }
}

/// Something to show a player: either a message template key or raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Notification {
    Template(String),
    Raw(String),
}

impl Notification {
    pub fn template(key: impl Into<String>) -> Self {
        Notification::Template(key.into())
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Notification::Raw(text.into())
    }
}

/// Title fade timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleTiming {
    pub fade_in: Duration,
    pub stay: Duration,
    pub fade_out: Duration,
}

impl Default for TitleTiming {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_millis(500),
            stay: Duration::from_millis(1000),
            fade_out: Duration::from_millis(500),
        }
    }
}

/// One refresh of the countdown display
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownFrame {
    /// `None` leaves the current title untouched
    pub title: Option<String>,
    /// Elapsed fraction, always within `[0, 1]`
    pub progress: f64,
}

/// Arena runtime settings
#[derive(Debug, Clone)]
pub struct ArenaSettings {
    /// Pre-game countdown in ms (default: 3000)
    pub countdown_ms: u64,
    /// Countdown display refresh interval in ms (default: 50, one server tick)
    pub refresh_interval_ms: u64,
    /// Delay between a round ending and the arena reopening in ms (default: 5000)
    pub reset_delay_ms: u64,
    /// Start automatically once this many players wait (default: None, operator start only)
    pub auto_start_players: Option<usize>,
    /// Countdown title prefix (default: "Starting ")
    pub countdown_label: Option<String>,
    /// Item granted to every player when a round starts
    pub starting_tool: ItemDescriptor,
    /// Timings used for arena-wide titles
    pub title_timing: TitleTiming,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            countdown_ms: 3000,
            refresh_interval_ms: 50,
            reset_delay_ms: 5000,
            auto_start_players: None,
            countdown_label: Some("Starting ".to_string()),
            starting_tool: ItemDescriptor::starting_shovel(),
            title_timing: TitleTiming::default(),
        }
    }
}

impl ArenaSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countdown_ms(mut self, ms: u64) -> Self {
        self.countdown_ms = ms;
        self
    }

    pub fn refresh_interval_ms(mut self, ms: u64) -> Self {
        self.refresh_interval_ms = ms;
        self
    }

    pub fn reset_delay_ms(mut self, ms: u64) -> Self {
        self.reset_delay_ms = ms;
        self
    }

    pub fn auto_start_players(mut self, n: usize) -> Self {
        self.auto_start_players = Some(n);
        self
    }

    pub fn countdown_label(mut self, label: impl Into<String>) -> Self {
        self.countdown_label = Some(label.into());
        self
    }

    pub fn no_countdown_label(mut self) -> Self {
        self.countdown_label = None;
        self
    }

    pub fn starting_tool(mut self, item: ItemDescriptor) -> Self {
        self.starting_tool = item;
        self
    }

    pub fn title_timing(mut self, timing: TitleTiming) -> Self {
        self.title_timing = timing;
        self
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}
