//! Runs an arena on its own tokio task.
//!
//! Commands from the host and tasks fired by the scheduler are drained by a
//! single loop, so nothing touches the arena concurrently.

use crate::arena::{Arena, ArenaEvent, ArenaServices};
use crate::config::{ArenaConfig, FloorConfig};
use crate::error::{ArenaError, Result};
use crate::floor::Floor;
use crate::host::{PlayerDirectory, TileInteraction, World};
use crate::scheduler::{ScheduledTask, TokioScheduler};
use crate::time::TokioClock;
use crate::types::{ArenaSettings, GameState, Location, PlayerId, TilePos};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 100;

/// Requests the arena task understands
#[derive(Debug)]
pub enum ArenaCommand {
    Join {
        player: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    TileInteract {
        actor: PlayerId,
        pos: TilePos,
        reply: oneshot::Sender<TileInteraction>,
    },
    PlayerMove {
        player: PlayerId,
        location: Location,
    },
    Enable {
        reply: oneshot::Sender<Result<()>>,
    },
    Disable {
        reply: oneshot::Sender<()>,
    },
    StartGame {
        reply: oneshot::Sender<Result<()>>,
    },
    EndGame {
        reply: oneshot::Sender<Result<()>>,
    },
    Rename {
        name: String,
        reply: oneshot::Sender<()>,
    },
    AddFloor {
        floor: FloorConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveFloor {
        index: usize,
        reply: oneshot::Sender<Result<FloorConfig>>,
    },
    SetLobby {
        location: Location,
        reply: oneshot::Sender<()>,
    },
    SetSpectate {
        location: Location,
        reply: oneshot::Sender<()>,
    },
    SetEliminationHeight {
        height: i32,
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<GameState>,
    },
    Config {
        reply: oneshot::Sender<ArenaConfig>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to a running arena
#[derive(Debug, Clone)]
pub struct ArenaHandle {
    tx: mpsc::Sender<ArenaCommand>,
}

/// Build an arena from `config` and run it on a new task.
///
/// Returns the handle and the stream of arena events. Events are dropped if
/// the receiver falls behind; the arena never waits on it.
pub fn spawn_arena(
    config: ArenaConfig,
    settings: ArenaSettings,
    world: Arc<dyn World>,
    players: Arc<dyn PlayerDirectory>,
) -> Result<(ArenaHandle, mpsc::Receiver<ArenaEvent>)> {
    let (scheduler, tasks) = TokioScheduler::channel();
    let services = ArenaServices {
        world,
        players,
        scheduler: Arc::new(scheduler),
        clock: Arc::new(TokioClock::new()),
    };
    let arena = Arena::from_config(config, settings, services)?;

    let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

    tokio::spawn(run(arena, commands, tasks, event_tx));

    Ok((ArenaHandle { tx }, event_rx))
}

async fn run(
    mut arena: Arena,
    mut commands: mpsc::Receiver<ArenaCommand>,
    mut tasks: mpsc::UnboundedReceiver<ScheduledTask>,
    events: mpsc::Sender<ArenaEvent>,
) {
    info!("Arena {} running", arena.name());
    let mut shutdown_reply = None;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(command) => {
                    if let Some(reply) = apply(&mut arena, command) {
                        shutdown_reply = Some(reply);
                        break;
                    }
                }
                None => break,
            },

            Some(task) = tasks.recv() => arena.run_scheduled(task),
        }

        for event in arena.drain_events() {
            if let Err(e) = events.try_send(event) {
                debug!("Dropping arena event: {}", e);
            }
        }
    }

    arena.shutdown();
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

/// Run one command. Returns the reply channel when the command asks the loop to stop.
fn apply(arena: &mut Arena, command: ArenaCommand) -> Option<oneshot::Sender<()>> {
    match command {
        ArenaCommand::Join { player, reply } => {
            let _ = reply.send(arena.add_player(player));
        }
        ArenaCommand::Leave { player, reply } => {
            let _ = reply.send(arena.remove_player(player));
        }
        ArenaCommand::TileInteract { actor, pos, reply } => {
            let _ = reply.send(arena.on_tile_interact(actor, pos));
        }
        ArenaCommand::PlayerMove { player, location } => {
            arena.on_player_move(player, location);
        }
        ArenaCommand::Enable { reply } => {
            let _ = reply.send(arena.enable());
        }
        ArenaCommand::Disable { reply } => {
            arena.disable();
            let _ = reply.send(());
        }
        ArenaCommand::StartGame { reply } => {
            let result = arena.start_game();
            if let Err(e) = &result {
                warn!("Arena {} failed to start: {}", arena.name(), e);
            }
            let _ = reply.send(result);
        }
        ArenaCommand::EndGame { reply } => {
            let _ = reply.send(arena.end_game());
        }
        ArenaCommand::Rename { name, reply } => {
            arena.set_name(name);
            let _ = reply.send(());
        }
        ArenaCommand::AddFloor { floor, reply } => {
            let result = Floor::new(floor.tiles, floor.material).and_then(|f| arena.add_floor(f));
            let _ = reply.send(result);
        }
        ArenaCommand::RemoveFloor { index, reply } => {
            let result = arena.remove_floor(index).map(|f| FloorConfig {
                material: f.material().clone(),
                tiles: f.tiles().to_vec(),
            });
            let _ = reply.send(result);
        }
        ArenaCommand::SetLobby { location, reply } => {
            arena.set_lobby(location);
            let _ = reply.send(());
        }
        ArenaCommand::SetSpectate { location, reply } => {
            arena.set_spectate(location);
            let _ = reply.send(());
        }
        ArenaCommand::SetEliminationHeight { height, reply } => {
            arena.set_elimination_height(height);
            let _ = reply.send(());
        }
        ArenaCommand::State { reply } => {
            let _ = reply.send(arena.state());
        }
        ArenaCommand::Config { reply } => {
            let _ = reply.send(arena.to_config());
        }
        ArenaCommand::Shutdown { reply } => return Some(reply),
    }
    None
}

impl ArenaHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ArenaCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ArenaError::Closed)?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    pub async fn join(&self, player: PlayerId) -> Result<bool> {
        self.request(|reply| ArenaCommand::Join { player, reply }).await
    }

    pub async fn leave(&self, player: PlayerId) -> Result<bool> {
        self.request(|reply| ArenaCommand::Leave { player, reply }).await
    }

    pub async fn tile_interact(&self, actor: PlayerId, pos: TilePos) -> Result<TileInteraction> {
        self.request(|reply| ArenaCommand::TileInteract { actor, pos, reply })
            .await
    }

    pub async fn player_move(&self, player: PlayerId, location: Location) -> Result<()> {
        self.tx
            .send(ArenaCommand::PlayerMove { player, location })
            .await
            .map_err(|_| ArenaError::Closed)
    }

    pub async fn enable(&self) -> Result<()> {
        self.request(|reply| ArenaCommand::Enable { reply }).await?
    }

    pub async fn disable(&self) -> Result<()> {
        self.request(|reply| ArenaCommand::Disable { reply }).await
    }

    pub async fn start_game(&self) -> Result<()> {
        self.request(|reply| ArenaCommand::StartGame { reply }).await?
    }

    pub async fn end_game(&self) -> Result<()> {
        self.request(|reply| ArenaCommand::EndGame { reply }).await?
    }

    pub async fn rename(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| ArenaCommand::Rename { name, reply }).await
    }

    /// Add a floor. Rejected while a round is underway.
    pub async fn add_floor(&self, floor: FloorConfig) -> Result<()> {
        self.request(|reply| ArenaCommand::AddFloor { floor, reply })
            .await?
    }

    /// Remove the floor at `index` (highest first). Rejected while a round is underway.
    pub async fn remove_floor(&self, index: usize) -> Result<FloorConfig> {
        self.request(|reply| ArenaCommand::RemoveFloor { index, reply })
            .await?
    }

    pub async fn set_lobby(&self, location: Location) -> Result<()> {
        self.request(|reply| ArenaCommand::SetLobby { location, reply })
            .await
    }

    pub async fn set_spectate(&self, location: Location) -> Result<()> {
        self.request(|reply| ArenaCommand::SetSpectate { location, reply })
            .await
    }

    pub async fn set_elimination_height(&self, height: i32) -> Result<()> {
        self.request(|reply| ArenaCommand::SetEliminationHeight { height, reply })
            .await
    }

    pub async fn state(&self) -> Result<GameState> {
        self.request(|reply| ArenaCommand::State { reply }).await
    }

    pub async fn config(&self) -> Result<ArenaConfig> {
        self.request(|reply| ArenaCommand::Config { reply }).await
    }

    /// Stop the arena task, cancelling its countdown ticker first
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| ArenaCommand::Shutdown { reply }).await
    }
}
