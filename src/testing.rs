//! Recording fakes for the host interfaces

use crate::arena::{Arena, ArenaServices};
use crate::floor::Floor;
use crate::host::{PlayerDirectory, PlayerSession, World};
use crate::scheduler::ManualScheduler;
use crate::time::{Duration, ManualClock};
use crate::types::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum WorldCall {
    Empty(TilePos),
    Effect(TilePos, Material),
    Restore(TilePos, Material),
}

#[derive(Debug, Default)]
pub struct RecordingWorld {
    calls: Mutex<Vec<WorldCall>>,
}

impl RecordingWorld {
    pub fn calls(&self) -> Vec<WorldCall> {
        self.calls.lock().clone()
    }

    pub fn emptied(&self) -> Vec<TilePos> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                WorldCall::Empty(pos) => Some(*pos),
                _ => None,
            })
            .collect()
    }

    pub fn restored(&self) -> Vec<TilePos> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                WorldCall::Restore(pos, _) => Some(*pos),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl World for RecordingWorld {
    fn set_tile_empty(&self, pos: TilePos) {
        self.calls.lock().push(WorldCall::Empty(pos));
    }

    fn play_break_effect(&self, pos: TilePos, material: &Material) {
        self.calls.lock().push(WorldCall::Effect(pos, material.clone()));
    }

    fn restore_tile(&self, pos: TilePos, material: &Material) {
        self.calls.lock().push(WorldCall::Restore(pos, material.clone()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Teleport(Location),
    Notify(Notification),
    Title(Notification),
    Grant(ItemDescriptor),
    Snapshot,
    Restore,
    ShowCountdown(CountdownFrame),
    ClearCountdown,
}

#[derive(Debug, Default)]
pub struct FakeSession {
    calls: Mutex<Vec<SessionCall>>,
}

impl FakeSession {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn teleports(&self) -> Vec<Location> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SessionCall::Teleport(loc) => Some(*loc),
                _ => None,
            })
            .collect()
    }

    pub fn frames(&self) -> Vec<CountdownFrame> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SessionCall::ShowCountdown(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &SessionCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl PlayerSession for FakeSession {
    fn teleport(&self, location: Location) {
        self.calls.lock().push(SessionCall::Teleport(location));
    }

    fn send_notification(&self, notification: &Notification) {
        self.calls.lock().push(SessionCall::Notify(notification.clone()));
    }

    fn send_title(&self, title: &Notification, _subtitle: Option<&Notification>, _timing: TitleTiming) {
        self.calls.lock().push(SessionCall::Title(title.clone()));
    }

    fn grant_item(&self, item: &ItemDescriptor) {
        self.calls.lock().push(SessionCall::Grant(item.clone()));
    }

    fn snapshot_inventory(&self) {
        self.calls.lock().push(SessionCall::Snapshot);
    }

    fn restore_inventory(&self) {
        self.calls.lock().push(SessionCall::Restore);
    }

    fn show_countdown(&self, frame: &CountdownFrame) {
        self.calls.lock().push(SessionCall::ShowCountdown(frame.clone()));
    }

    fn clear_countdown(&self) {
        self.calls.lock().push(SessionCall::ClearCountdown);
    }
}

#[derive(Debug, Default)]
pub struct FakeDirectory {
    sessions: Mutex<HashMap<PlayerId, Arc<FakeSession>>>,
}

impl FakeDirectory {
    /// Register a new online player
    pub fn connect(&self) -> (PlayerId, Arc<FakeSession>) {
        let id = PlayerId::new();
        let session = Arc::new(FakeSession::default());
        self.sessions.lock().insert(id, session.clone());
        (id, session)
    }

    pub fn disconnect(&self, player: PlayerId) {
        self.sessions.lock().remove(&player);
    }
}

impl PlayerDirectory for FakeDirectory {
    fn session(&self, player: PlayerId) -> Option<Arc<dyn PlayerSession>> {
        let session = self.sessions.lock().get(&player).cloned()?;
        Some(session as Arc<dyn PlayerSession>)
    }
}

pub const FLOOR_Y: i32 = 0;
pub const ELIMINATION_Y: i32 = -5;

pub fn lobby() -> Location {
    Location::new(100.0, 70.0, 100.0)
}

pub fn spectate() -> Location {
    Location::new(0.0, 40.0, 0.0)
}

/// A straight row of `len` tiles at height `y`
pub fn row(y: i32, len: i32) -> Vec<TilePos> {
    (0..len).map(|x| TilePos::new(x, y, 0)).collect()
}

pub fn floor(y: i32, len: i32) -> Floor {
    Floor::new(row(y, len), Material::new("snow_block")).expect("non-empty floor")
}

/// An arena wired to recording fakes and a manual clock
pub struct Harness {
    pub arena: Arena,
    pub world: Arc<RecordingWorld>,
    pub players: Arc<FakeDirectory>,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
}

impl Harness {
    pub fn new(settings: ArenaSettings) -> Self {
        let world = Arc::new(RecordingWorld::default());
        let players = Arc::new(FakeDirectory::default());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let services = ArenaServices {
            world: world.clone(),
            players: players.clone(),
            scheduler: scheduler.clone(),
            clock: clock.clone(),
        };

        Self {
            arena: Arena::new("A", settings, services),
            world,
            players,
            clock,
            scheduler,
        }
    }

    /// One 10-tile floor, lobby and spectate points, enabled
    pub fn waiting() -> Self {
        Self::waiting_with(ArenaSettings::default())
    }

    pub fn waiting_with(settings: ArenaSettings) -> Self {
        let mut harness = Self::new(settings);
        harness.arena.add_floor(floor(FLOOR_Y, 10)).expect("add floor");
        harness.arena.set_lobby(lobby());
        harness.arena.set_spectate(spectate());
        harness.arena.set_elimination_height(ELIMINATION_Y);
        harness.arena.enable().expect("enable");
        harness.world.clear();
        harness
    }

    pub fn join(&mut self) -> (PlayerId, Arc<FakeSession>) {
        let (id, session) = self.players.connect();
        self.arena.add_player(id);
        (id, session)
    }

    /// Advance the manual clock, running whatever comes due
    pub fn advance(&mut self, ms: u64) {
        let arena = &mut self.arena;
        self.scheduler
            .advance(Duration::from_millis(ms), |task| arena.run_scheduled(task));
    }

    pub fn now_ms(&self) -> u64 {
        use crate::time::Clock;
        self.clock.now_ms()
    }
}
