//! Arena - the game state machine

use crate::config::{ArenaConfig, FloorConfig};
use crate::countdown::Countdown;
use crate::error::{ArenaError, Result};
use crate::floor::Floor;
use crate::host::{GameEventHandler, PlayerDirectory, PlayerSession, TileInteraction, World};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::time::Clock;
use crate::types::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Arena events emitted to the application
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    StateChanged { from: GameState, to: GameState },
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    PlayerEliminated(PlayerId),
    TileBroken { player: PlayerId, pos: TilePos },
    /// Round over. `None` when nobody is left standing
    GameEnded { winner: Option<PlayerId> },
}

/// Host services an arena works against
#[derive(Clone)]
pub struct ArenaServices {
    pub world: Arc<dyn World>,
    pub players: Arc<dyn PlayerDirectory>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
}

/// One spleef arena: its floors, roster and round lifecycle.
///
/// All methods take `&mut self`; the owner is expected to feed every event
/// (joins, tile interactions, scheduled tasks) through one queue.
pub struct Arena {
    name: String,
    state: GameState,
    settings: ArenaSettings,
    /// Highest first
    floors: Vec<Floor>,
    /// Roster in join order
    players: Vec<PlayerId>,
    members: HashSet<PlayerId>,
    /// Still standing in the current round
    alive: HashSet<PlayerId>,
    /// Joined during starting/ended, placed on the next transition
    pending: HashSet<PlayerId>,
    started_with: usize,
    lobby: Option<Location>,
    spectate: Option<Location>,
    elimination_height: i32,
    countdown: Countdown,
    /// Bumped on every start, end and disable so deferred tasks can tell they are stale
    round: u64,
    world: Arc<dyn World>,
    directory: Arc<dyn PlayerDirectory>,
    scheduler: Arc<dyn Scheduler>,
    events: Vec<ArenaEvent>,
}

impl Arena {
    /// Create a new, disabled arena
    pub fn new(name: impl Into<String>, settings: ArenaSettings, services: ArenaServices) -> Self {
        let mut countdown = Countdown::new(
            services.scheduler.clone(),
            services.clock,
            services.players.clone(),
            settings.refresh_interval(),
        );
        countdown.set_label(settings.countdown_label.clone());

        Self {
            name: name.into(),
            state: GameState::Disabled,
            settings,
            floors: Vec::new(),
            players: Vec::new(),
            members: HashSet::new(),
            alive: HashSet::new(),
            pending: HashSet::new(),
            started_with: 0,
            lobby: None,
            spectate: None,
            elimination_height: 0,
            countdown,
            round: 0,
            world: services.world,
            directory: services.players,
            scheduler: services.scheduler,
            events: Vec::new(),
        }
    }

    /// Rebuild a saved arena. It comes back disabled.
    pub fn from_config(
        config: ArenaConfig,
        settings: ArenaSettings,
        services: ArenaServices,
    ) -> Result<Self> {
        config.validate()?;

        let mut arena = Self::new(config.name, settings, services);
        for floor in config.floors {
            arena.floors.push(Floor::new(floor.tiles, floor.material)?);
        }
        arena.sort_floors();
        arena.lobby = config.lobby;
        arena.spectate = config.spectate;
        arena.elimination_height = config.elimination_height;
        Ok(arena)
    }

    /// Snapshot of everything that should be saved
    pub fn to_config(&self) -> ArenaConfig {
        ArenaConfig {
            name: self.name.clone(),
            floors: self
                .floors
                .iter()
                .map(|f| FloorConfig {
                    material: f.material().clone(),
                    tiles: f.tiles().to_vec(),
                })
                .collect(),
            lobby: self.lobby,
            spectate: self.spectate,
            elimination_height: self.elimination_height,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uniqueness across arenas is up to whoever keeps the arena list
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn settings(&self) -> &ArenaSettings {
        &self.settings
    }

    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    /// The floor a tile belongs to
    pub fn floor_at(&self, pos: TilePos) -> Option<&Floor> {
        self.floors.iter().find(|f| f.contains(pos))
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.alive.contains(&player)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn lobby(&self) -> Option<Location> {
        self.lobby
    }

    pub fn set_lobby(&mut self, location: Location) {
        self.lobby = Some(location);
    }

    pub fn spectate(&self) -> Option<Location> {
        self.spectate
    }

    pub fn set_spectate(&mut self, location: Location) {
        self.spectate = Some(location);
    }

    pub fn elimination_height(&self) -> i32 {
        self.elimination_height
    }

    /// Players below this height are out. Keep it under the lowest floor.
    pub fn set_elimination_height(&mut self, height: i32) {
        self.elimination_height = height;
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<ArenaEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Floors
    // =========================================================================

    pub fn add_floor(&mut self, floor: Floor) -> Result<()> {
        self.ensure_not_in_round("add a floor")?;
        self.floors.push(floor);
        self.sort_floors();
        Ok(())
    }

    pub fn remove_floor(&mut self, index: usize) -> Result<Floor> {
        self.ensure_not_in_round("remove a floor")?;
        if index >= self.floors.len() {
            return Err(ArenaError::FloorNotFound(index));
        }
        Ok(self.floors.remove(index))
    }

    /// Order floors highest first. Stable for floors at the same height.
    pub fn sort_floors(&mut self) {
        self.floors.sort_by_key(|f| Reverse(f.elevation()));
    }

    fn ensure_not_in_round(&self, action: &'static str) -> Result<()> {
        if self.state.in_round() {
            return Err(ArenaError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a disabled arena for players
    pub fn enable(&mut self) -> Result<()> {
        if self.state != GameState::Disabled {
            return Err(ArenaError::InvalidState {
                action: "enable",
                state: self.state,
            });
        }
        if self.floors.is_empty() {
            return Err(ArenaError::NoFloors);
        }
        if self.lobby.is_none() {
            return Err(ArenaError::MissingLocation("lobby"));
        }
        if self.spectate.is_none() {
            return Err(ArenaError::MissingLocation("spectate"));
        }

        self.sort_floors();
        if let Some(lowest) = self.floors.last() {
            if self.elimination_height >= lowest.elevation() {
                warn!(
                    "Arena {} eliminates at y={}, which is not below its lowest floor at y={}",
                    self.name,
                    self.elimination_height,
                    lowest.elevation()
                );
            }
        }
        self.regenerate_floors();
        self.set_state(GameState::Waiting);
        Ok(())
    }

    /// Close the arena from any state. Everyone is sent off with their inventory back.
    pub fn disable(&mut self) {
        if self.state == GameState::Disabled {
            return;
        }

        self.round += 1;
        self.countdown.set_visible(false);
        self.countdown.clear_subscribers();

        for player in std::mem::take(&mut self.players) {
            self.with_session(player, |s| s.restore_inventory());
            self.events.push(ArenaEvent::PlayerLeft(player));
        }
        self.members.clear();
        self.alive.clear();
        self.pending.clear();
        self.started_with = 0;

        self.regenerate_floors();
        self.set_state(GameState::Disabled);
    }

    /// Cancel any live ticker. Call when the process is going down.
    pub fn shutdown(&mut self) {
        self.countdown.set_visible(false);
        info!("Arena {} shut down", self.name);
    }

    fn set_state(&mut self, to: GameState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!("Arena {}: {} -> {}", self.name, from, to);
        self.events.push(ArenaEvent::StateChanged { from, to });
    }

    fn regenerate_floors(&self) {
        for floor in &self.floors {
            floor.regenerate(self.world.as_ref());
        }
    }

    // =========================================================================
    // Roster
    // =========================================================================

    /// Add a player and send them where the current state wants them.
    ///
    /// Ignored while disabled. Players joining while starting or ended are
    /// kept and placed on the next transition.
    pub fn add_player(&mut self, player: PlayerId) -> bool {
        if !self.state.is_joinable() {
            debug!("Arena {} is disabled, ignoring join from {}", self.name, player);
            return false;
        }
        if !self.members.insert(player) {
            debug!("Player {} is already in arena {}", player, self.name);
            return false;
        }

        self.players.push(player);
        self.with_session(player, |s| s.snapshot_inventory());
        self.events.push(ArenaEvent::PlayerJoined(player));

        match self.state {
            GameState::Playing => self.send_to_spectate(player),
            GameState::Waiting => {
                self.send_to_lobby(player);
                self.check_auto_start();
            }
            GameState::Starting | GameState::Ended => {
                debug!("Deferring placement of {} in arena {}", player, self.name);
                self.pending.insert(player);
            }
            GameState::Disabled => {}
        }
        true
    }

    /// Remove a player and hand their inventory back
    pub fn remove_player(&mut self, player: PlayerId) -> bool {
        if !self.members.remove(&player) {
            return false;
        }

        self.players.retain(|p| *p != player);
        self.alive.remove(&player);
        self.pending.remove(&player);
        self.countdown.remove_subscriber(player);
        self.with_session(player, |s| s.restore_inventory());
        self.events.push(ArenaEvent::PlayerLeft(player));

        self.check_win();
        true
    }

    pub fn send_to_lobby(&self, player: PlayerId) {
        if !self.contains(player) {
            warn!(
                "Player {} was sent to the lobby of arena {}, but they aren't in that arena",
                player, self.name
            );
            return;
        }
        let lobby = self.lobby;
        self.with_session(player, |s| {
            match lobby {
                Some(location) => s.teleport(location),
                None => warn!("Arena {} has no lobby location", self.name),
            }
            s.send_notification(&Notification::template(messages::LOBBY_JOIN));
        });
    }

    pub fn send_to_spectate(&self, player: PlayerId) {
        if !self.contains(player) {
            warn!(
                "Player {} was sent to spectate arena {}, but they aren't in that arena",
                player, self.name
            );
            return;
        }
        let spectate = self.spectate;
        self.with_session(player, |s| {
            match spectate {
                Some(location) => s.teleport(location),
                None => warn!("Arena {} has no spectate location", self.name),
            }
            s.send_notification(&Notification::template(messages::SPECTATE_IN_PROGRESS));
        });
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Put everyone on the top floor and count down to play.
    ///
    /// Checks everything up front, so a failed start leaves the arena
    /// waiting with nobody moved. Calling again while starting does nothing.
    pub fn start_game(&mut self) -> Result<()> {
        match self.state {
            GameState::Waiting => {}
            GameState::Starting => {
                debug!("Arena {} is already starting", self.name);
                return Ok(());
            }
            state => {
                return Err(ArenaError::InvalidState {
                    action: "start a game",
                    state,
                });
            }
        }

        if self.floors.is_empty() {
            return Err(ArenaError::NoFloors);
        }
        if self.players.is_empty() {
            return Err(ArenaError::NotEnoughPlayers {
                required: 1,
                present: 0,
            });
        }

        self.sort_floors();
        let top = &self.floors[0];
        if top.tile_count() < self.players.len() {
            return Err(ArenaError::NotEnoughTiles {
                tiles: top.tile_count(),
                players: self.players.len(),
            });
        }
        let mut spawns: BinaryHeap<Reverse<TilePos>> = top
            .spawn_tiles(self.players.len())
            .into_iter()
            .map(Reverse)
            .collect();

        self.round += 1;
        self.set_state(GameState::Starting);

        let tool = self.settings.starting_tool.clone();
        for player in self.players.clone() {
            let Some(Reverse(tile)) = spawns.pop() else {
                break;
            };
            self.with_session(player, |s| {
                s.teleport(Location::above(tile));
                s.grant_item(&tool);
            });
            self.alive.insert(player);
        }
        self.started_with = self.alive.len();

        let countdown = self.settings.countdown();
        self.countdown.clear_subscribers();
        self.countdown.add_subscribers(self.players.iter().copied());
        self.countdown.start_countdown(countdown);
        self.scheduler
            .run_after(countdown, ScheduledTask::BeginGame { round: self.round });

        info!(
            "Arena {} starting with {} players",
            self.name, self.started_with
        );
        Ok(())
    }

    /// Force the round to end with no winner
    pub fn end_game(&mut self) -> Result<()> {
        if !self.state.in_round() {
            return Err(ArenaError::InvalidState {
                action: "end a game",
                state: self.state,
            });
        }
        self.finish(None);
        Ok(())
    }

    /// Run a task from the scheduler
    pub fn run_scheduled(&mut self, task: ScheduledTask) {
        match task {
            ScheduledTask::CountdownRefresh { ticker } => {
                self.countdown.on_tick(ticker);
            }
            ScheduledTask::BeginGame { round } => self.begin(round),
            ScheduledTask::ResetArena { round } => self.reset(round),
        }
    }

    fn begin(&mut self, round: u64) {
        if self.state != GameState::Starting || round != self.round {
            debug!(
                "Arena {}: stale begin for round {} while {} (round {})",
                self.name, round, self.state, self.round
            );
            return;
        }

        self.set_state(GameState::Playing);
        self.countdown.set_visible(false);
        self.broadcast_title(&Notification::template(messages::GAME_BEGIN), None);

        let mut late: Vec<PlayerId> = self.pending.drain().collect();
        late.sort();
        for player in late {
            self.send_to_spectate(player);
        }

        self.check_win();
    }

    fn eliminate(&mut self, player: PlayerId) {
        if !self.alive.remove(&player) {
            return;
        }
        info!("Player {} eliminated from arena {}", player, self.name);
        self.events.push(ArenaEvent::PlayerEliminated(player));
        self.with_session(player, |s| {
            s.send_notification(&Notification::template(messages::GAME_ELIMINATED));
        });
        self.send_to_spectate(player);
        self.check_win();
    }

    /// End the round once nobody, or a single survivor of a multi-player round, is left
    fn check_win(&mut self) {
        if self.state != GameState::Playing {
            return;
        }
        match self.alive.len() {
            0 => self.finish(None),
            1 if self.started_with > 1 => {
                let winner = self.alive.iter().next().copied();
                self.finish(winner);
            }
            _ => {}
        }
    }

    fn finish(&mut self, winner: Option<PlayerId>) {
        self.round += 1;
        self.countdown.set_visible(false);
        self.set_state(GameState::Ended);
        self.events.push(ArenaEvent::GameEnded { winner });

        if let Some(winner) = winner {
            info!("Player {} won in arena {}", winner, self.name);
            self.with_session(winner, |s| {
                s.send_notification(&Notification::template(messages::GAME_WIN));
            });
        }
        self.broadcast_title(&Notification::template(messages::GAME_END), None);
        self.alive.clear();

        self.scheduler
            .run_after(self.settings.reset_delay(), ScheduledTask::ResetArena { round: self.round });
    }

    fn reset(&mut self, round: u64) {
        if self.state != GameState::Ended || round != self.round {
            debug!(
                "Arena {}: stale reset for round {} while {} (round {})",
                self.name, round, self.state, self.round
            );
            return;
        }

        self.regenerate_floors();
        self.pending.clear();
        self.started_with = 0;
        self.set_state(GameState::Waiting);

        for player in self.players.clone() {
            self.with_session(player, |s| {
                s.restore_inventory();
                s.snapshot_inventory();
            });
            self.send_to_lobby(player);
        }

        self.check_auto_start();
    }

    fn check_auto_start(&mut self) {
        let Some(needed) = self.settings.auto_start_players else {
            return;
        };
        if self.state == GameState::Waiting && self.players.len() >= needed {
            if let Err(e) = self.start_game() {
                warn!("Arena {} could not auto-start: {}", self.name, e);
            }
        }
    }

    // =========================================================================
    // Gameplay events
    // =========================================================================

    /// Decide what happens to a tile a player tries to break
    pub fn on_tile_interact(&mut self, actor: PlayerId, pos: TilePos) -> TileInteraction {
        if !self.contains(actor) {
            return TileInteraction::Ignored;
        }

        let Some(floor) = self.floors.iter().find(|f| f.contains(pos)) else {
            return TileInteraction::Blocked;
        };
        if !self.state.allows_tile_break() {
            return TileInteraction::Blocked;
        }

        floor.break_tile(pos, self.world.as_ref());
        self.events.push(ArenaEvent::TileBroken { player: actor, pos });
        TileInteraction::Broken
    }

    /// Eliminate a player who has fallen below the elimination height
    pub fn on_player_move(&mut self, player: PlayerId, location: Location) {
        if self.state != GameState::Playing || !self.alive.contains(&player) {
            return;
        }
        if location.y < f64::from(self.elimination_height) {
            self.eliminate(player);
        }
    }

    // =========================================================================
    // Broadcasts
    // =========================================================================

    /// Show a title to every member. Offline players are skipped.
    pub fn broadcast_title(&self, title: &Notification, subtitle: Option<&Notification>) {
        let timing = self.settings.title_timing;
        for &player in &self.players {
            self.with_session(player, |s| s.send_title(title, subtitle, timing));
        }
    }

    pub fn broadcast_message(&self, notification: &Notification) {
        for &player in &self.players {
            self.with_session(player, |s| s.send_notification(notification));
        }
    }

    fn with_session(&self, player: PlayerId, f: impl FnOnce(&dyn PlayerSession)) -> bool {
        match self.directory.session(player) {
            Some(session) => {
                f(session.as_ref());
                true
            }
            None => {
                debug!("Player {} has no session, skipping", player);
                false
            }
        }
    }
}

impl GameEventHandler for Arena {
    fn handle_join_request(&mut self, player: PlayerId) -> bool {
        self.add_player(player)
    }

    fn handle_leave(&mut self, player: PlayerId) -> bool {
        self.remove_player(player)
    }

    fn handle_tile_interact(&mut self, actor: PlayerId, pos: TilePos) -> TileInteraction {
        self.on_tile_interact(actor, pos)
    }

    fn handle_player_move(&mut self, player: PlayerId, location: Location) {
        self.on_player_move(player, location);
    }
}
